use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Covers clock skew too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn aged(minutes: i64) -> CachedData<()> {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - Duration::minutes(minutes);
        cached
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_future_timestamp() {
        assert_eq!(aged(-10).age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        assert_eq!(aged(5).age_display(), "5m ago");
        assert_eq!(aged(90).age_display(), "2h ago");
        assert_eq!(aged(80).age_display(), "1h ago");
        assert_eq!(aged(1440 + 13 * 60).age_display(), "2d ago");
        assert_eq!(aged(1440 + 60).age_display(), "1d ago");
    }
}
