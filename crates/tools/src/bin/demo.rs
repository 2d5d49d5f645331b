//! lanevm-demo
//!
//! Compile a sample expression, optionally show its bytecode, and run it.
//!
//! Usage: `lanevm-demo [--program NAME] [--instances N] [--disassemble] [--json]`

use std::process;

use clap::Parser;
use tracing::{error, info};

use lanevm_tools::samples::{Sample, StreamData};
use lanevm_vm::{Compiler, CompilerConfig, GlobalData, ProcessingStream, ProcessingStreamMut, Vm};

#[derive(Parser, Debug)]
#[command(name = "lanevm-demo")]
#[command(about = "Compile and run a sample lanevm expression")]
struct Args {
    /// Sample program to compile
    #[arg(long, value_enum, default_value = "offset")]
    program: Sample,

    /// Number of instances to evaluate
    #[arg(long, default_value_t = 10)]
    instances: usize,

    /// Print the bytecode listing before running
    #[arg(long)]
    disassemble: bool,

    /// Print the compiled program as JSON
    #[arg(long)]
    json: bool,

    /// Record and log the node count after every transform pass
    #[arg(long)]
    trace_passes: bool,
}

fn main() {
    lanevm_tools::init_logging();

    let args = Args::parse();

    let mut ast = args.program.build();
    let mut compiler = Compiler::new(CompilerConfig {
        trace_passes: args.trace_passes,
        ..CompilerConfig::default()
    });
    let program = match compiler.compile(&mut ast) {
        Ok(program) => program,
        Err(e) => {
            error!("Compilation error: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Compiled {:?}: {} instructions, {} registers",
        args.program,
        program.num_instructions(),
        program.num_temp_registers()
    );

    if args.disassemble {
        print!("{program}");
    }
    if args.json {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to encode program: {}", e);
                process::exit(1);
            }
        }
    }

    let inputs = args.program.inputs(args.instances);
    let mut outputs = args.program.outputs(args.instances);
    let input_streams: Vec<_> = inputs
        .iter()
        .map(|data| ProcessingStream::from_bytes(data.desc.name.clone(), data.desc.data_type, &data.bytes))
        .collect();
    let mut output_streams: Vec<_> = outputs
        .iter_mut()
        .map(|data| {
            ProcessingStreamMut::from_bytes(data.desc.name.clone(), data.desc.data_type, &mut data.bytes)
        })
        .collect();

    let mut vm = Vm::new();
    if let Err(e) = vm.execute(
        &program,
        &input_streams,
        &mut output_streams,
        args.instances,
        &GlobalData::new(),
    ) {
        error!("Execution error: {}", e);
        process::exit(1);
    }
    drop(output_streams);

    print_table(&inputs, &outputs, args.instances);
}

fn print_table(inputs: &[StreamData], outputs: &[StreamData], instances: usize) {
    let columns: Vec<(String, Vec<String>)> = inputs
        .iter()
        .chain(outputs)
        .map(|data| (data.desc.to_string(), data.format_values()))
        .collect();

    let header: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    println!("{:>6} | {}", "#", header.join(" | "));
    for instance in 0..instances {
        let row: Vec<&str> = columns
            .iter()
            .map(|(_, values)| values.get(instance).map_or("", String::as_str))
            .collect();
        println!("{instance:>6} | {}", row.join(" | "));
    }
}
