use clap::{Parser, Subcommand};

use crate::config::{CatalogArgs, ServeArgs, SubmitArgs};

#[derive(Debug, Parser)]
#[command(name = "snorkel", version, about = "Map masking proxy and headless client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the catalog/mask proxy for the browser map.
    Serve(ServeArgs),
    /// Run one submission cycle against a mask service and report the result.
    Submit(SubmitArgs),
    /// Print the layer catalog of a mask service.
    Catalog(CatalogArgs),
}
