use anyhow::{Context, Result};
use medvault_core::navigation::{Navigator, LOGIN_VIEW};
use medvault_core::{Config, Registration, Role, Session, SessionState};
use serde_json::Value;
use tracing::warn;

use crate::cli::{Command, RegisterArgs};

/// Prints where the web front end would navigate.
pub struct TerminalNavigator {
    path: String,
}

impl TerminalNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        self.path.clone()
    }

    fn navigate(&mut self, path: &str) {
        if path == LOGIN_VIEW {
            eprintln!("Session expired. Run `medvault login` to sign in again.");
        } else {
            eprintln!("-> {}", path);
        }
        self.path = path.to_string();
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_body(body: Option<Value>) -> Result<()> {
    match body {
        Some(value) => print_json(&value),
        None => Ok(()),
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::prompt_password("Password: ").context("Failed to read password"),
    }
}

pub async fn run(command: Command, session: &Session, config: &mut Config) -> Result<()> {
    let api = session.api();

    match command {
        Command::Login { email, password } => {
            let email = email
                .or_else(|| config.last_email.clone())
                .ok_or_else(|| anyhow::anyhow!("--email is required"))?;
            let password = password_or_prompt(password)?;

            let user = session.login(&email, &password).await?;
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            eprintln!("Logged in as {}", user.display_name());
            print_json(&user)
        }
        Command::Logout => {
            session.logout();
            eprintln!("Logged out");
            Ok(())
        }
        Command::Register(args) => {
            let registration = registration_from(args)?;
            let created = session.register(&registration).await?;
            eprintln!("Registered {}. Run `medvault login` to sign in.", registration.email);
            print_body(created)
        }
        Command::Whoami => match session.start().await {
            SessionState::Authenticated(user) => print_json(&user),
            _ => Err(anyhow::anyhow!("Not logged in")),
        },
        Command::Profile => print_body(api.patient_profile().await?),
        Command::Appointments => print_json(&api.patient_appointments().await?),
        Command::Prescriptions => print_json(&api.patient_prescriptions().await?),
        Command::Records => print_json(&api.patient_medical_records().await?),
        Command::Doctors => print_json(&api.doctors().await?),
        Command::Dashboard => print_json(&api.patient_dashboard().await?),
        Command::Cancel { id } => print_body(api.cancel_appointment(id).await?),
        Command::SetStatus { id, status } => {
            print_body(api.update_appointment_status(id, status).await?)
        }
        Command::Get { path } => {
            let response = api.request(&path, Default::default()).await?;
            if !response.is_success() {
                eprintln!("HTTP {}", response.status);
            }
            print_body(response.body)
        }
    }
}

fn registration_from(args: RegisterArgs) -> Result<Registration> {
    let password = password_or_prompt(args.password)?;
    let mut registration =
        Registration::new(&args.email, &password, &args.name, Role::from(args.role));
    registration.phone = args.phone;
    registration.address = args.address;
    registration.date_of_birth = args.date_of_birth;
    registration.emergency_contact = args.emergency_contact;
    registration.blood_group = args.blood_group;
    registration.specialization = args.specialization;
    registration.license_number = args.license_number;
    Ok(registration)
}
