use async_trait::async_trait;
use clap::Subcommand;
use std::error::Error;
use std::fs;
use thicket_core::cfg_ir::Module;

pub mod cfg;
pub mod obfuscate;
pub mod print;

#[derive(Subcommand)]
pub enum Cmd {
    /// Insert bogus control flow into a module
    Obfuscate(obfuscate::ObfuscateArgs),

    /// Write a module's CFG as Graphviz dot to stdout or a file
    Cfg(cfg::CfgArgs),

    /// Print a module as textual IR
    Print(print::PrintArgs),
}

#[async_trait]
pub trait Command {
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Obfuscate(args) => args.execute().await,
            Cmd::Cfg(args) => args.execute().await,
            Cmd::Print(args) => args.execute().await,
        }
    }
}

/// Reads and decodes a JSON module.
pub(crate) fn load_module(path: &str) -> Result<Module, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    Ok(Module::from_json(&text)?)
}
