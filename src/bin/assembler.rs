use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::{env, process};

use pdp11asm::assembler::{self, output, EngineOptions};
use pdp11asm::logging::error;

enum OutputFormat {
    Hex,
    Verilog,
    Binary,
}

struct Args {
    input: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
    case_sensitive_symbols: bool,
    jmp_label_indirect: bool,
    cpu: Option<String>,
    list: Option<String>,
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [-verilog|-binary] [--case-sensitive-symbols] [--jmp-label-indirect] \
         [--cpu NAME] [--list PATH|-] <input.asm> [output]"
    )
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut format = OutputFormat::Hex;
    let mut case_sensitive_symbols = false;
    let mut jmp_label_indirect = false;
    let mut cpu = None;
    let mut list = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-verilog" => format = OutputFormat::Verilog,
            "-binary" => format = OutputFormat::Binary,
            "--case-sensitive-symbols" => case_sensitive_symbols = true,
            "--jmp-label-indirect" => jmp_label_indirect = true,
            "--cpu" => {
                i += 1;
                cpu = Some(
                    argv.get(i)
                        .ok_or_else(|| "--cpu requires a value".to_string())?
                        .clone(),
                );
            }
            "--list" => {
                i += 1;
                list = Some(
                    argv.get(i)
                        .ok_or_else(|| "--list requires a value".to_string())?
                        .clone(),
                );
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.is_empty() || positional.len() > 2 {
        return Err("expected an input path and an optional output path".to_string());
    }

    Ok(Args {
        input: PathBuf::from(&positional[0]),
        output: positional.get(1).map(PathBuf::from),
        format,
        case_sensitive_symbols,
        jmp_label_indirect,
        cpu,
        list,
    })
}

fn default_output_path(input: &Path, format: &OutputFormat) -> PathBuf {
    let ext = match format {
        OutputFormat::Hex => "mem",
        OutputFormat::Verilog => "v",
        OutputFormat::Binary => "bin",
    };
    input.with_extension(ext)
}

fn open_list_writer(spec: &str) -> io::Result<Box<dyn Write>> {
    if spec == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(File::create(spec)?))
    }
}

/// Mirrors the reference CLI's distinct exit codes: 1 for usage errors, 2
/// for assembly failures, 3 for failing to write the output file.
enum RunError {
    Usage(String),
    Assembly(String),
    OutputWrite(String),
}

fn run(argv: &[String]) -> Result<(), RunError> {
    let args = parse_args(argv).map_err(RunError::Usage)?;

    let options = EngineOptions {
        case_sensitive_symbols: args.case_sensitive_symbols,
        jmp_label_indirect: args.jmp_label_indirect,
        cpu: args.cpu.clone(),
    };

    let mut engine = assembler::Engine::new(options).map_err(|e| RunError::Assembly(e.to_string()))?;
    if let Some(spec) = &args.list {
        let w = open_list_writer(spec)
            .map_err(|e| RunError::Usage(format!("cannot open list file: {e}")))?;
        engine.set_list_writer(w);
    }

    let image = engine
        .assemble_file(&args.input)
        .map_err(|e| RunError::Assembly(e.to_string()))?;

    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, &args.format));
    let mut out_file = File::create(&out_path)
        .map_err(|e| RunError::OutputWrite(format!("cannot create {}: {e}", out_path.display())))?;

    match args.format {
        OutputFormat::Hex => output::write_hex(&mut out_file, image.start_addr, &image.bytes),
        OutputFormat::Verilog => {
            output::write_verilog(&mut out_file, image.start_addr, &image.bytes)
        }
        OutputFormat::Binary => output::write_binary(&mut out_file, &image.bytes),
    }
    .map_err(|e| RunError::OutputWrite(format!("cannot write {}: {e}", out_path.display())))?;

    Ok(())
}

fn main() {
    let argv: Vec<String> = env::args().collect();
    let prog = argv
        .first()
        .cloned()
        .unwrap_or_else(|| "assembler".to_string());
    match run(&argv[1..]) {
        Ok(()) => {}
        Err(RunError::Usage(msg)) => {
            error(format!("{msg}\n{}", usage(&prog)));
            process::exit(1);
        }
        Err(RunError::Assembly(msg)) => {
            error(msg);
            process::exit(2);
        }
        Err(RunError::OutputWrite(msg)) => {
            error(msg);
            process::exit(3);
        }
    }
}
