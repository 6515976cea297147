use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;

use diag::{DiagSink, StdoutSink};
use scan::{FunctionRecord, Indexer};

/* Lists all function declarations and calls in a group of C program
files, and reports missing prototypes, name collisions between functions
and other named elements, functions declared in the wrong scope, and other
function-related problems. Input files must be run through a preprocessor
first (gcc -E file.c > file.i); if not, warnings are produced and the
results will be incorrect. */

#[derive(Parser, Debug)]
#[command(
    name = "cindex",
    about = "Index function declarations, prototypes, and calls in preprocessed C sources",
    version
)]
struct Cli {
    /// Preprocessed C files (gcc -E output) to index
    inputs: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    println!();
    if cli.inputs.is_empty() {
        println!("Must specify at least one file to process");
        return;
    }

    let sink: Rc<dyn DiagSink> = Rc::new(StdoutSink);
    let mut indexer = Indexer::new(sink);
    let mut records: Vec<FunctionRecord> = Vec::new();

    for input in &cli.inputs {
        if let Err(error) = index_file(&mut indexer, input, &mut records) {
            println!(
                "Processing file {} stopped early due to error: {}",
                input.display(),
                error
            );
        }
    }
    // close out the last unit so its warnings precede the report
    drop(indexer);

    if records.is_empty() {
        println!("No functions were found!");
        return;
    }
    records.sort();
    println!(
        "Function name         scope               caller                source          line"
    );
    for record in &records {
        println!("{}", record);
    }
}

fn index_file(
    indexer: &mut Indexer,
    input: &PathBuf,
    records: &mut Vec<FunctionRecord>,
) -> anyhow::Result<()> {
    indexer.start(input)?;
    while !indexer.have_eof() {
        records.push(indexer.next_function()?);
    }
    Ok(())
}
