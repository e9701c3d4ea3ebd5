use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use messmeter_types::models::MealType;

use crate::error::QrError;

/// Discriminator for admin-issued payloads.
pub const ADMIN_QR_TYPE: &str = "admin_attendance";

/// Rolling 31-multiplier hash over the payload fields, rendered as base-36.
/// Wraps in i32 space; the absolute value is taken before rendering.
pub fn checksum(input: &str) -> String {
    let mut h: i32 = 0;
    for b in input.bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as i32);
    }
    to_base36(h.unsigned_abs())
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

/// Self-issued student QR payload. Ephemeral: lives only inside the rendered
/// code and the validator. The `hash` field is a checksum over the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfQr {
    pub uid: Uuid,
    pub meal: MealType,
    pub date: NaiveDate,
    pub ts: i64,
    pub hash: String,
}

impl SelfQr {
    pub fn build(uid: Uuid, meal: MealType, date: NaiveDate, ts: i64) -> Self {
        let hash = checksum(&Self::signing_input(uid, meal, date, ts));
        SelfQr {
            uid,
            meal,
            date,
            ts,
            hash,
        }
    }

    fn signing_input(uid: Uuid, meal: MealType, date: NaiveDate, ts: i64) -> String {
        format!("{}-{}-{}-{}", uid, meal.as_str(), date, ts)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("self QR payload serializes")
    }

    /// Parse, verify the checksum, and enforce one-calendar-day freshness.
    pub fn validate(raw: &str, today: NaiveDate) -> Result<SelfQr, QrError> {
        let payload: SelfQr = serde_json::from_str(raw).map_err(|_| QrError::Malformed)?;

        let expected = checksum(&Self::signing_input(
            payload.uid,
            payload.meal,
            payload.date,
            payload.ts,
        ));
        if payload.hash != expected {
            return Err(QrError::Tampered);
        }
        if payload.date != today {
            return Err(QrError::Stale {
                payload_date: payload.date,
            });
        }
        Ok(payload)
    }
}

/// Admin-issued shared QR payload. Carries no checksum: integrity comes from
/// server-side possession — the `qr_id` must match the code persisted for
/// (meal, date), which clients cannot forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQr {
    #[serde(rename = "type")]
    pub kind: String,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub qr_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl AdminQr {
    pub fn build(meal: MealType, date: NaiveDate, qr_id: Uuid, generated_at: DateTime<Utc>) -> Self {
        AdminQr {
            kind: ADMIN_QR_TYPE.to_string(),
            meal_type: meal,
            date,
            qr_id,
            generated_at,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("admin QR payload serializes")
    }

    /// Shape and freshness check only; possession is verified against the
    /// store by the caller.
    pub fn validate(raw: &str, today: NaiveDate) -> Result<AdminQr, QrError> {
        let payload: AdminQr = serde_json::from_str(raw).map_err(|_| QrError::Malformed)?;
        if payload.kind != ADMIN_QR_TYPE {
            return Err(QrError::Malformed);
        }
        if payload.date != today {
            return Err(QrError::Stale {
                payload_date: payload.date,
            });
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn self_qr_round_trip() {
        let uid = Uuid::new_v4();
        let today = date(2025, 3, 14);
        let qr = SelfQr::build(uid, MealType::Lunch, today, 1_741_950_000_000);

        let validated = SelfQr::validate(&qr.encode(), today).unwrap();
        assert_eq!(validated, qr);
    }

    #[test]
    fn tampered_hash_detected() {
        let today = date(2025, 3, 14);
        let qr = SelfQr::build(Uuid::new_v4(), MealType::Dinner, today, 42);

        // Flip one character of the hash
        let mut bad = qr.clone();
        let mut chars: Vec<char> = bad.hash.chars().collect();
        chars[0] = if chars[0] == 'z' { 'a' } else { 'z' };
        bad.hash = chars.into_iter().collect();

        assert_eq!(
            SelfQr::validate(&bad.encode(), today),
            Err(QrError::Tampered)
        );
    }

    #[test]
    fn tampered_field_detected() {
        let today = date(2025, 3, 14);
        let qr = SelfQr::build(Uuid::new_v4(), MealType::Lunch, today, 42);

        let mut forged = qr.clone();
        forged.meal = MealType::Dinner;
        assert_eq!(
            SelfQr::validate(&forged.encode(), today),
            Err(QrError::Tampered)
        );
    }

    #[test]
    fn yesterdays_code_is_stale() {
        let yesterday = date(2025, 3, 13);
        let today = date(2025, 3, 14);
        let qr = SelfQr::build(Uuid::new_v4(), MealType::Breakfast, yesterday, 42);

        assert_eq!(
            SelfQr::validate(&qr.encode(), today),
            Err(QrError::Stale {
                payload_date: yesterday
            })
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let today = date(2025, 3, 14);
        assert_eq!(SelfQr::validate("not json", today), Err(QrError::Malformed));
        assert_eq!(
            SelfQr::validate(r#"{"uid":"x"}"#, today),
            Err(QrError::Malformed)
        );
    }

    #[test]
    fn admin_qr_round_trip_and_freshness() {
        let today = date(2025, 3, 14);
        let qr = AdminQr::build(MealType::Lunch, today, Uuid::new_v4(), Utc::now());

        let validated = AdminQr::validate(&qr.encode(), today).unwrap();
        assert_eq!(validated.qr_id, qr.qr_id);

        let tomorrow = date(2025, 3, 15);
        assert_eq!(
            AdminQr::validate(&qr.encode(), tomorrow),
            Err(QrError::Stale {
                payload_date: today
            })
        );
    }

    #[test]
    fn admin_qr_wrong_type_tag_is_malformed() {
        let today = date(2025, 3, 14);
        let mut qr = AdminQr::build(MealType::Lunch, today, Uuid::new_v4(), Utc::now());
        qr.kind = "something_else".into();
        assert_eq!(AdminQr::validate(&qr.encode(), today), Err(QrError::Malformed));
    }

    #[test]
    fn checksum_is_stable_base36() {
        // Known-answer: empty input hashes to 0
        assert_eq!(checksum(""), "0");
        // Deterministic for a fixed input
        assert_eq!(checksum("abc"), checksum("abc"));
        assert_ne!(checksum("abc"), checksum("abd"));
    }
}
