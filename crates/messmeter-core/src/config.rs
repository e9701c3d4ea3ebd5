/// Point magnitudes for the award flows. Externally configurable; these
/// defaults are the documented fallback.
#[derive(Debug, Clone, Copy)]
pub struct PointsConfig {
    /// Base grant per recorded attendance.
    pub attendance: i64,
    /// Extra grant when the streak hits a milestone.
    pub streak_milestone: i64,
    /// Grant per meal feedback submission.
    pub meal_review: i64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        PointsConfig {
            attendance: 5,
            streak_milestone: 10,
            meal_review: 2,
        }
    }
}
