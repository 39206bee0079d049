/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use z80asm::assembler::{self, AssemblerResult};
use z80asm::cpu::{step_driver, Cpu};
use z80asm::loader;

#[derive(Parser)]
#[clap(version, author = "Connor Nolan")]
struct Opts {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file to raw bytes or a machine-code listing.
    Assemble {
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(long)]
        listing: bool,
    },
    /// Assemble and run a program for N CPU steps, printing the final state.
    Run {
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        steps: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let opts = Opts::parse();

    match opts.command {
        Commands::Assemble { input, output, listing } => run_assemble(&input, output.as_deref(), listing),
        Commands::Run { input, steps } => run_run(&input, steps),
    }
}

fn run_assemble(input: &std::path::Path, output: Option<&std::path::Path>, listing: bool) -> Result<()> {
    tracing::debug!(path = %input.display(), "reading source");
    let source = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;

    tracing::debug!("assembling");
    let details = match assembler::assemble(&source) {
        AssemblerResult::Success { details, .. } => details,
        AssemblerResult::Failure { errors } => {
            for err in &errors {
                eprintln!("line {}: {}", err.line, err.message);
            }
            bail!("assembly failed with {} error(s)", errors.len());
        }
    };

    if listing {
        let rendered = assembler::listing::render_listing(&details);
        match output {
            Some(path) => fs::write(path, rendered)?,
            None => print!("{rendered}"),
        }
    } else {
        let bytes: Vec<u8> = details.iter().flat_map(|d| d.opcodes.iter().copied()).collect();
        match output {
            Some(path) => fs::write(path, &bytes)?,
            None => {
                use std::io::Write;
                std::io::stdout().write_all(&bytes)?;
            }
        }
    }

    tracing::debug!("done");
    Ok(())
}

fn run_run(input: &std::path::Path, steps: u32) -> Result<()> {
    let source = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;

    let (load_address, details) = match assembler::assemble(&source) {
        AssemblerResult::Success { load_address, details } => (load_address, details),
        AssemblerResult::Failure { errors } => {
            for err in &errors {
                eprintln!("line {}: {}", err.line, err.message);
            }
            bail!("assembly failed with {} error(s)", errors.len());
        }
    };

    let mut memory = Box::new([0u8; 65536]);
    let mut io = Box::new([0u8; 256]);
    loader::load(&details, &mut memory);

    let mut cpu = Cpu::new();
    cpu.registers.pc = load_address;
    cpu.registers.sp = 0xFFFF;
    let result = step_driver::run(&mut cpu, &mut memory, &mut io, steps);

    println!("instructions executed: {}", result.instructions_executed);
    println!("halted: {}", result.halted);
    println!(
        "A={:02X} B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X}",
        result.registers.a,
        result.registers.b,
        result.registers.c,
        result.registers.d,
        result.registers.e,
        result.registers.h,
        result.registers.l,
    );
    println!("PC={:04X} SP={:04X}", result.registers.pc, result.registers.sp);
    println!("Z={} C={}", result.registers.zero, result.registers.carry);
    if let Some(err) = result.error {
        eprintln!("stopped: {err}");
    }

    Ok(())
}
