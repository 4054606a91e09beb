//! Patient and doctor resources consumed by the dashboards.
//!
//! The schemas of these resources belong to the backend, so they are
//! returned as raw JSON.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ApiClient, ApiError, RequestOptions};

const PATIENT_PROFILE: &str = "/api/patients/profile";
const PATIENT_APPOINTMENTS: &str = "/api/appointments/patient";
const PATIENT_PRESCRIPTIONS: &str = "/api/prescriptions/patient";
const PATIENT_MEDICAL_RECORDS: &str = "/api/medical-records/patient";
const DOCTORS: &str = "/api/doctors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" | "CANCELED" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

/// Everything the patient dashboard shows, fetched in one go.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientDashboard {
    pub profile: Option<Value>,
    pub appointments: Vec<Value>,
    pub prescriptions: Vec<Value>,
    pub medical_records: Vec<Value>,
}

impl PatientDashboard {
    pub fn completed_visits(&self) -> impl Iterator<Item = &Value> {
        self.appointments
            .iter()
            .filter(|a| a.get("status").and_then(Value::as_str) == Some("COMPLETED"))
    }
}

// A successful answer that is not an array (nothing, an object) shows as an
// empty list. Failed answers never get here.
fn into_list(path: &str, body: Option<Value>) -> Vec<Value> {
    match body {
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!(path = path, body = %other, "Expected a JSON array");
            Vec::new()
        }
        None => Vec::new(),
    }
}

impl ApiClient {
    /// GET `path`; non-2xx statuses become [`ApiError::Status`].
    async fn fetch(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.request_json(path, RequestOptions::new(Method::GET)).await
    }

    async fn fetch_list(&self, path: &str) -> Result<Vec<Value>, ApiError> {
        let body = self.fetch(path).await?;
        Ok(into_list(path, body))
    }

    pub async fn patient_profile(&self) -> Result<Option<Value>, ApiError> {
        self.fetch(PATIENT_PROFILE).await
    }

    pub async fn patient_appointments(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_list(PATIENT_APPOINTMENTS).await
    }

    pub async fn patient_prescriptions(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_list(PATIENT_PRESCRIPTIONS).await
    }

    pub async fn patient_medical_records(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_list(PATIENT_MEDICAL_RECORDS).await
    }

    pub async fn doctors(&self) -> Result<Vec<Value>, ApiError> {
        self.fetch_list(DOCTORS).await
    }

    /// Fetch profile, appointments, prescriptions and records concurrently.
    pub async fn patient_dashboard(&self) -> Result<PatientDashboard, ApiError> {
        let (profile, appointments, prescriptions, medical_records) = futures::try_join!(
            self.patient_profile(),
            self.patient_appointments(),
            self.patient_prescriptions(),
            self.patient_medical_records(),
        )?;
        debug!(
            appointments = appointments.len(),
            prescriptions = prescriptions.len(),
            records = medical_records.len(),
            "Patient dashboard loaded"
        );

        Ok(PatientDashboard {
            profile,
            appointments,
            prescriptions,
            medical_records,
        })
    }

    pub async fn update_appointment_status(
        &self,
        appointment_id: i64,
        status: AppointmentStatus,
    ) -> Result<Option<Value>, ApiError> {
        let path = format!("/api/appointments/{}/status", appointment_id);
        let options = RequestOptions::new(Method::PUT).with_json(&json!({ "status": status }))?;
        self.request_json(&path, options).await
    }

    pub async fn cancel_appointment(&self, appointment_id: i64) -> Result<Option<Value>, ApiError> {
        self.update_appointment_status(appointment_id, AppointmentStatus::Cancelled)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::Cancelled).unwrap(),
            json!("CANCELLED")
        );
        assert_eq!("canceled".parse::<AppointmentStatus>(), Ok(AppointmentStatus::Cancelled));
        assert_eq!("Confirmed".parse::<AppointmentStatus>(), Ok(AppointmentStatus::Confirmed));
        assert!("later".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_into_list() {
        assert_eq!(into_list("/x", Some(json!([1, 2]))).len(), 2);
        assert!(into_list("/x", Some(json!({"items": []}))).is_empty());
        assert!(into_list("/x", None).is_empty());
    }

    #[test]
    fn test_completed_visits() {
        let dashboard = PatientDashboard {
            appointments: vec![
                json!({"id": 1, "status": "COMPLETED"}),
                json!({"id": 2, "status": "PENDING"}),
                json!({"id": 3}),
            ],
            ..Default::default()
        };
        let ids: Vec<_> = dashboard.completed_visits().map(|a| a["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1)]);
    }
}
