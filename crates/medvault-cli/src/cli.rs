use clap::{Parser, Subcommand};
use medvault_core::api::AppointmentStatus;
use medvault_core::navigation::{DASHBOARD_VIEW, LOGIN_VIEW, REGISTER_VIEW};

#[derive(Debug, Parser)]
#[command(name = "medvault", version, about = "MedVault hospital management client")]
pub struct Cli {
    /// API origin, overrides config and MEDVAULT_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Origin the client is served from, used to derive the API origin
    #[arg(long, global = true)]
    pub origin: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session token
    Login {
        /// Defaults to the last email used
        #[arg(long)]
        email: Option<String>,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create an account (does not log in)
    Register(RegisterArgs),
    /// Validate the stored token and show the current user
    Whoami,
    /// Patient profile
    Profile,
    /// Patient appointments
    Appointments,
    /// Patient prescriptions
    Prescriptions,
    /// Patient medical records
    Records,
    /// All doctors
    Doctors,
    /// Profile, appointments, prescriptions and records together
    Dashboard,
    /// Cancel an appointment
    Cancel { id: i64 },
    /// Set an appointment's status
    SetStatus { id: i64, status: AppointmentStatus },
    /// GET any API path and print the parsed body
    Get { path: String },
}

#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub name: String,
    /// patient or doctor
    #[arg(long, default_value = "patient")]
    pub role: String,
    /// Prompted for when omitted
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date_of_birth: Option<String>,
    #[arg(long)]
    pub emergency_contact: Option<String>,
    #[arg(long)]
    pub blood_group: Option<String>,
    #[arg(long)]
    pub specialization: Option<String>,
    #[arg(long)]
    pub license_number: Option<String>,
}

impl Command {
    /// The view this command corresponds to in the web front end.
    pub fn view(&self) -> &'static str {
        match self {
            Command::Login { .. } | Command::Logout => LOGIN_VIEW,
            Command::Register(_) => REGISTER_VIEW,
            _ => DASHBOARD_VIEW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_status() {
        let cli = Cli::try_parse_from(["medvault", "set-status", "7", "confirmed"]).unwrap();
        match cli.command {
            Command::SetStatus { id, status } => {
                assert_eq!(id, 7);
                assert_eq!(status, AppointmentStatus::Confirmed);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_views() {
        let cli = Cli::try_parse_from(["medvault", "--api-url", "http://h:8081", "login"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://h:8081"));
        assert_eq!(cli.command.view(), LOGIN_VIEW);

        let cli = Cli::try_parse_from(["medvault", "doctors"]).unwrap();
        assert_eq!(cli.command.view(), DASHBOARD_VIEW);
    }
}
