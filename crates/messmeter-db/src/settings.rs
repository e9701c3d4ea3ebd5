use anyhow::Result;
use rusqlite::params;
use tracing::warn;

use messmeter_core::window::MealTimeSettings;
use messmeter_types::api::MealWindowConfig;

use crate::Database;

impl Database {
    /// Load the admin-configured windows, falling back to the documented
    /// defaults for any meal without a stored row. Stored strings were
    /// validated on write; a parse failure here means a corrupt store.
    pub fn load_meal_settings(&self) -> Result<MealTimeSettings> {
        let mut dto = MealTimeSettings::default().to_dto();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT meal, toggle_start, toggle_end, scan_start, scan_end
                 FROM meal_time_settings",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        MealWindowConfig {
                            toggle_start: row.get(1)?,
                            toggle_end: row.get(2)?,
                            scan_start: row.get(3)?,
                            scan_end: row.get(4)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for (meal, config) in rows {
                match meal.as_str() {
                    "breakfast" => dto.breakfast = config,
                    "lunch" => dto.lunch = config,
                    "dinner" => dto.dinner = config,
                    other => warn!("Ignoring settings row for unknown meal '{}'", other),
                }
            }
            Ok(())
        })?;

        MealTimeSettings::from_dto(&dto)
            .map_err(|e| anyhow::anyhow!("stored meal windows are corrupt: {}", e))
    }

    /// Persist all three meals' windows. Callers validate via
    /// `MealTimeSettings::from_dto` first, so only well-formed times land here.
    pub fn save_meal_settings(&self, settings: &MealTimeSettings) -> Result<()> {
        let dto = settings.to_dto();
        let rows = [
            ("breakfast", &dto.breakfast),
            ("lunch", &dto.lunch),
            ("dinner", &dto.dinner),
        ];

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for (meal, config) in rows {
                tx.execute(
                    "INSERT INTO meal_time_settings (meal, toggle_start, toggle_end, scan_start, scan_end)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(meal) DO UPDATE SET
                        toggle_start = excluded.toggle_start,
                        toggle_end = excluded.toggle_end,
                        scan_start = excluded.scan_start,
                        scan_end = excluded.scan_end",
                    params![
                        meal,
                        config.toggle_start,
                        config.toggle_end,
                        config.scan_start,
                        config.scan_end,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use messmeter_types::api::MealTimeSettingsDto;

    use super::*;

    #[test]
    fn defaults_when_nothing_stored() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.load_meal_settings().unwrap();
        assert_eq!(settings.to_dto().lunch.scan_start, "12:00");
    }

    #[test]
    fn saved_windows_round_trip() {
        let db = Database::open_in_memory().unwrap();

        let mut dto: MealTimeSettingsDto = MealTimeSettings::default().to_dto();
        dto.lunch.scan_start = "12:30".into();
        dto.lunch.scan_end = "15:00".into();
        let settings = MealTimeSettings::from_dto(&dto).unwrap();

        db.save_meal_settings(&settings).unwrap();
        let loaded = db.load_meal_settings().unwrap();
        let loaded_dto = loaded.to_dto();
        assert_eq!(loaded_dto.lunch.scan_start, "12:30");
        assert_eq!(loaded_dto.lunch.scan_end, "15:00");
        // Untouched meals keep their defaults
        assert_eq!(loaded_dto.breakfast.scan_start, "07:00");
    }
}
