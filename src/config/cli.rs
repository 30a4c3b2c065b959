use crate::core::exporter::ExportFormat;
use crate::domain::model::ServiceType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "leadcheck")]
#[command(about = "Bulk Jornaya LeadID / TrustedForm certificate validation")]
pub struct CliConfig {
    /// Path to TOML configuration file (built-in defaults + environment when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service (validate / download endpoints)
    Serve {
        /// Override server.port from the configuration
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate a local file and write the annotated results next to it
    Validate {
        #[arg(short, long)]
        input: PathBuf,

        /// jornaya | trustedform
        #[arg(short, long)]
        service: ServiceType,

        #[arg(short, long, default_value = "./output")]
        output_dir: String,

        /// csv | excel
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,

        #[arg(long, help = "Log CPU / memory usage per phase")]
        monitor: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_command() {
        let config = CliConfig::parse_from([
            "leadcheck",
            "validate",
            "--input",
            "leads.csv",
            "--service",
            "trustedform",
            "--format",
            "excel",
            "-v",
        ]);

        assert!(config.verbose);
        match config.command {
            Command::Validate {
                input,
                service,
                output_dir,
                format,
                monitor,
            } => {
                assert_eq!(input, PathBuf::from("leads.csv"));
                assert_eq!(service, ServiceType::TrustedForm);
                assert_eq!(output_dir, "./output");
                assert_eq!(format, ExportFormat::Excel);
                assert!(!monitor);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_command() {
        let config = CliConfig::parse_from(["leadcheck", "--config", "app.toml", "serve", "--port", "9000"]);

        assert_eq!(config.config, Some(PathBuf::from("app.toml")));
        assert!(matches!(config.command, Command::Serve { port: Some(9000) }));
    }

    #[test]
    fn test_rejects_unknown_service() {
        let result = CliConfig::try_parse_from([
            "leadcheck",
            "validate",
            "--input",
            "leads.csv",
            "--service",
            "leadid",
        ]);
        assert!(result.is_err());
    }
}
