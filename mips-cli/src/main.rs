use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mips_assembler::{Assembler, AssemblerConfig, AssemblerError};
use mips_runtime::{CpuConfig, Machine, MachineConfig, RunOutcome};
use mips_spec::{ProgramImage, DATA_BASE, TEXT_BASE};

#[derive(Parser, Debug)]
#[command(author, version, about = "MIPS assembler, disassembler and simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into raw little-endian text and data segments
    Assemble {
        #[arg(value_name = "SOURCE")]
        input: PathBuf,
        /// Text segment output (default: SOURCE with a .bin extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Data segment output (default: text output with a .data extension)
        #[arg(long, value_name = "FILE")]
        data_output: Option<PathBuf>,
        #[command(flatten)]
        layout: Layout,
        /// Fail on warnings too
        #[arg(long)]
        warnings_as_errors: bool,
    },
    /// Print a listing of a raw text segment
    Disassemble {
        #[arg(value_name = "BINFILE")]
        input: PathBuf,
        /// Load address of the first word (hex or dec)
        #[arg(long, value_parser = parse_address, default_value_t = TEXT_BASE)]
        base: u32,
    },
    /// Assemble and run a source file, using stdin for console input
    Run {
        #[arg(value_name = "SOURCE")]
        input: PathBuf,
        #[command(flatten)]
        layout: Layout,
        /// Branches and jumps take effect immediately
        #[arg(long)]
        no_delay_slot: bool,
        /// Stop after this many instructions
        #[arg(long, default_value_t = 10_000_000u64)]
        max_cycles: u64,
        /// Read console input from a file instead of stdin
        #[arg(long, value_name = "FILE")]
        stdin: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Layout {
    /// Base address of the text segment (hex or dec)
    #[arg(long, value_parser = parse_address, default_value_t = TEXT_BASE)]
    text_base: u32,
    /// Base address of the data segment (hex or dec)
    #[arg(long, value_parser = parse_address, default_value_t = DATA_BASE)]
    data_base: u32,
}

fn parse_address(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address `{}`: {}", text, e))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Assemble {
            input,
            output,
            data_output,
            layout,
            warnings_as_errors,
        } => {
            let image = assemble_file(&input, &layout, warnings_as_errors)?;
            let output = output.unwrap_or_else(|| input.with_extension("bin"));
            std::fs::write(&output, &image.text)
                .with_context(|| format!("writing {}", output.display()))?;
            if !image.data.is_empty() {
                let data_output = data_output.unwrap_or_else(|| output.with_extension("data"));
                std::fs::write(&data_output, &image.data)
                    .with_context(|| format!("writing {}", data_output.display()))?;
            }
            eprintln!(
                "{}: {} instructions, {} data bytes, entry {:#010x}",
                output.display(),
                image.word_count(),
                image.data.len(),
                image.entry
            );
        }
        Command::Disassemble { input, base } => {
            let text = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let image = ProgramImage {
                text,
                text_base: base,
                entry: base,
                ..ProgramImage::new()
            };
            print!("{}", mips_disassembler::disassemble(&image)?);
        }
        Command::Run {
            input,
            layout,
            no_delay_slot,
            max_cycles,
            stdin,
        } => {
            let image = assemble_file(&input, &layout, false)?;
            let console = match stdin {
                Some(path) => {
                    std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?
                }
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let config = MachineConfig {
                cpu: CpuConfig {
                    delayed_branching: !no_delay_slot,
                },
                channel_capacity: console.chars().count().max(mips_runtime::io::DEFAULT_CAPACITY),
                max_cycles,
                ..MachineConfig::default()
            };
            let code = run(&image, config, &console)?;
            std::process::exit(code);
        }
    }
    Ok(())
}

fn assemble_file(path: &Path, layout: &Layout, warnings_as_errors: bool) -> Result<ProgramImage> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let assembler = Assembler::new(AssemblerConfig {
        text_base: layout.text_base,
        data_base: layout.data_base,
        warnings_as_errors,
        ..AssemblerConfig::default()
    });
    let assembly = assembler.run(&source);
    for diagnostic in &assembly.diagnostics {
        eprintln!("{}: {}", path.display(), diagnostic.render(&source));
    }
    let failed =
        assembly.has_errors() || (warnings_as_errors && assembly.warnings().next().is_some());
    if failed {
        return Err(AssemblerError::Failed(assembly.diagnostics).into());
    }
    assembly.image.validate()?;
    Ok(assembly.image)
}

fn run(image: &ProgramImage, config: MachineConfig, console: &str) -> Result<i32> {
    let max_cycles = config.max_cycles;
    let mut machine = Machine::new(image, config)?;
    machine.channels_mut().stdin.push_str(console);
    machine.channels_mut().stdin.close();

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let mut remaining = max_cycles;
    loop {
        let outcome = machine.run(remaining)?;
        stdout.write_all(machine.channels_mut().stdout.drain_string().as_bytes())?;
        stdout.flush()?;
        match outcome {
            RunOutcome::Exited { code, cycles } => {
                tracing::info!("exited with code {} after {} cycles", code, cycles);
                return Ok(code);
            }
            // Only output can block once stdin is closed; it was just drained
            RunOutcome::Blocked { cycles } => remaining = remaining.saturating_sub(cycles),
            RunOutcome::Faulted { signal, cycles } => {
                bail!("{} after {} cycles", signal, cycles)
            }
            RunOutcome::CycleLimit { cycles } => bail!("cycle limit reached after {} cycles", cycles),
        }
    }
}
