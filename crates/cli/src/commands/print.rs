use async_trait::async_trait;
use clap::Args;
use std::error::Error;
use thicket_utils::errors::ObfuscateError;

use super::load_module;

#[derive(Args)]
pub struct PrintArgs {
    /// Module to print (JSON)
    pub input: String,
    /// Print only this procedure
    #[arg(short, long)]
    function: Option<String>,
}

#[async_trait]
impl super::Command for PrintArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let module = load_module(&self.input)?;
        match &self.function {
            Some(name) => {
                let proc = module
                    .procedure(name)
                    .ok_or_else(|| ObfuscateError::UnknownProcedure(name.clone()))?;
                print!("{proc}");
            }
            None => print!("{module}"),
        }
        Ok(())
    }
}
