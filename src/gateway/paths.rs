//! REST resource paths. Relative to the configured base URL.

pub const PATIENTS: &str = "/patient";
pub const PATIENT_SEARCH: &str = "/patient/search/filters";
pub const REPORTS: &str = "/reports";
pub const EXAMS: &str = "/exams";
pub const SURGERIES: &str = "/surgery";
pub const HOSPITALIZATIONS: &str = "/hospitalizations";
pub const VACCINES: &str = "/vaccine";
pub const FILES: &str = "/files";
pub const UPLOAD_IMAGE: &str = "/uploads/image/";
pub const UPLOAD_FILE: &str = "/uploads/file/";
pub const USERS: &str = "/user";
pub const USER_ME: &str = "/user/me";

pub fn patient(id: &str) -> String {
    format!("{PATIENTS}/{id}")
}

pub fn report(id: &str) -> String {
    format!("{REPORTS}/{id}")
}

pub fn patient_reports(patient_id: &str) -> String {
    format!("{REPORTS}/{patient_id}/reports")
}

pub fn exam(id: &str) -> String {
    format!("{EXAMS}/{id}")
}

pub fn patient_exams(patient_id: &str) -> String {
    format!("{EXAMS}/{patient_id}/exams")
}

pub fn surgery(id: &str) -> String {
    format!("{SURGERIES}/{id}")
}

pub fn hospitalization(id: &str) -> String {
    format!("{HOSPITALIZATIONS}/{id}")
}

pub fn vaccine(id: &str) -> String {
    format!("{VACCINES}/{id}")
}

pub fn file(id: &str) -> String {
    format!("{FILES}/{id}")
}

pub fn patient_files(patient_id: &str) -> String {
    format!("{FILES}/{patient_id}/files")
}

pub fn user(id: &str) -> String {
    format!("{USERS}/{id}")
}
