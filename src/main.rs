pub mod assemble;
pub mod clean;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod ir;
pub mod lower;
pub mod semantics;
pub mod syntax;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.init_logging();
    command_line_interface.run()
}
