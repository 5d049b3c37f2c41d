use std::fmt;

/// Stable identifier grouping every observer that should see the same data.
///
/// Keys are ordered segments. Invalidation matches by segment prefix, so
/// invalidating `["reports"]` also refreshes `["reports", "p1"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` is a segment-wise prefix of this key (a key is its own prefix).
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

// ── Key builders ─────────────────────────────────────────

pub fn patients() -> QueryKey {
    QueryKey::new(["patients"])
}

pub fn patient(id: &str) -> QueryKey {
    QueryKey::new(["patient", id])
}

/// Search results; every filter pair is part of the key.
pub fn patient_search(filters: &[(String, String)]) -> QueryKey {
    filters
        .iter()
        .fold(patients().child("search"), |key, (k, v)| key.child(format!("{k}={v}")))
}

pub fn patient_reports(patient_id: &str) -> QueryKey {
    QueryKey::new(["reports", patient_id])
}

pub fn report(id: &str) -> QueryKey {
    QueryKey::new(["report", id])
}

pub fn patient_exams(patient_id: &str) -> QueryKey {
    QueryKey::new(["exams", patient_id])
}

pub fn exam(id: &str) -> QueryKey {
    QueryKey::new(["exam", id])
}

pub fn surgery(id: &str) -> QueryKey {
    QueryKey::new(["surgery", id])
}

pub fn hospitalization(id: &str) -> QueryKey {
    QueryKey::new(["hospitalization", id])
}

pub fn vaccine(id: &str) -> QueryKey {
    QueryKey::new(["vaccine", id])
}

pub fn file(id: &str) -> QueryKey {
    QueryKey::new(["file", id])
}

pub fn patient_files(patient_id: &str) -> QueryKey {
    QueryKey::new(["files", patient_id])
}

pub fn user(id: &str) -> QueryKey {
    QueryKey::new(["user", id])
}

pub fn current_user() -> QueryKey {
    QueryKey::new(["user", "me"])
}
