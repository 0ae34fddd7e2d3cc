mod key;
mod map;
mod reduce;
mod run;

use bpaf::Bpaf;
use map::map_options;
use reduce::reduce_options;
use run::run_options;

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
enum Subcommand {
    /// Filter records and print key,value pairs
    #[bpaf(command)]
    Map(#[bpaf(external(map_options))] map::MapOptions),
    /// Aggregate key,value pairs and print group averages
    #[bpaf(command)]
    Reduce(#[bpaf(external(reduce_options))] reduce::ReduceOptions),
    /// Run the whole job from input files to an output file
    #[bpaf(command)]
    Run(#[bpaf(external(run_options))] run::RunOptions),
}

fn main() {
    env_logger::init();
    let result = match subcommand().run() {
        Subcommand::Map(opts) => map::map(opts),
        Subcommand::Reduce(opts) => reduce::reduce(opts),
        Subcommand::Run(opts) => run::run(opts),
    };
    match result {
        Ok(()) => (),
        Err(e) => {
            // Ignore EPIPE
            if let Some(e) = e.downcast_ref::<std::io::Error>() {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    return;
                }
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1)
        }
    }
}
