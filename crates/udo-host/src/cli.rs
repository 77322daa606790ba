use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "udo-host", version, about = "Loads UDO package libraries and drives them")]
pub struct Cli {
    /// Log filter (RUST_LOG syntax)
    #[arg(long, default_value = "info", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a registration library's version and descriptor
    Inspect {
        /// Path to the registration library
        #[arg(long)]
        reg_lib: PathBuf,

        /// Validate a definition of this operation type
        #[arg(long)]
        validate: Option<String>,

        #[arg(long, default_value_t = 1)]
        inputs: u32,

        #[arg(long, default_value_t = 1)]
        outputs: u32,

        /// Number of static params in the validated definition
        #[arg(long, default_value_t = 0)]
        params: u32,

        /// Core type (cpu, gpu or dsp)
        #[arg(long, default_value = "cpu")]
        core: String,
    },

    /// Execute one operation through an implementation library
    Run {
        /// Path to the implementation library
        #[arg(long)]
        impl_lib: PathBuf,

        #[arg(long)]
        op: String,

        /// Tensor dimensions, comma separated
        #[arg(long, value_delimiter = ',', default_value = "1,4")]
        shape: Vec<u32>,

        /// Input values, comma separated; must fill the shape
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        values: Vec<f32>,

        /// Number of executions
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        #[arg(long, default_value = "cpu")]
        core: String,
    },
}
