//! `GET /weatherforecast`: five days of made-up weather.

use axum::Json;
use chrono::{Days, Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// Number of days returned, starting tomorrow.
pub const FORECAST_DAYS: u64 = 5;

pub const MIN_TEMPERATURE_C: i32 = -20;
pub const MAX_TEMPERATURE_C: i32 = 54;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub summary: Option<&'static str>,
}

impl WeatherForecast {
    pub fn new(date: NaiveDate, temperature_c: i32, summary: Option<&'static str>) -> Self {
        Self {
            date,
            temperature_c,
            temperature_f: 32 + (temperature_c as f64 / 0.5556) as i32,
            summary,
        }
    }
}

/// Forecasts for the days after `today`.
pub fn generate<R: Rng>(today: NaiveDate, rng: &mut R) -> Vec<WeatherForecast> {
    (1..=FORECAST_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| {
            WeatherForecast::new(
                date,
                rng.gen_range(MIN_TEMPERATURE_C..=MAX_TEMPERATURE_C),
                SUMMARIES.choose(&mut *rng).copied(),
            )
        })
        .collect()
}

pub async fn get_weather_forecast() -> Json<Vec<WeatherForecast>> {
    let forecasts = generate(Local::now().date_naive(), &mut rand::thread_rng());
    tracing::info!(days = forecasts.len(), "Weather forecast generated");
    Json(forecasts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_five_consecutive_days_from_tomorrow() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let forecasts = generate(today, &mut StdRng::seed_from_u64(7));

        let dates: Vec<String> = forecasts.iter().map(|f| f.date.to_string()).collect();
        assert_eq!(
            dates,
            vec!["2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02", "2024-03-03"]
        );
    }

    #[test]
    fn test_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let today = NaiveDate::from_ymd_opt(2025, 12, 30).unwrap();

        for _ in 0..200 {
            for forecast in generate(today, &mut rng) {
                assert!((MIN_TEMPERATURE_C..=MAX_TEMPERATURE_C).contains(&forecast.temperature_c));
                assert!(forecast.summary.is_some_and(|s| SUMMARIES.contains(&s)));
            }
        }
    }

    #[test]
    fn test_fahrenheit_conversion() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(WeatherForecast::new(date, 0, None).temperature_f, 32);
        assert_eq!(WeatherForecast::new(date, 20, None).temperature_f, 67);
        assert_eq!(WeatherForecast::new(date, -20, None).temperature_f, -3);
    }

    #[test]
    fn test_json_shape() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let json = serde_json::to_value(WeatherForecast::new(date, 25, Some("Warm"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "date": "2025-06-01",
                "temperatureC": 25,
                "temperatureF": 76,
                "summary": "Warm"
            })
        );
    }
}
