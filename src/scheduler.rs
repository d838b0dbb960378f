//! Daily regeneration timer and startup check

use crate::pipeline::{Generator, Trigger};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use log::{info, warn};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A cron schedule evaluated in a fixed IANA timezone
#[derive(Debug, Clone)]
pub struct DailySchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

impl DailySchedule {
    /// Parse a cron expression and timezone name.
    ///
    /// Five-field expressions (`min hour dom month dow`) follow crontab
    /// conventions: they run at second zero and number weekdays from
    /// `0` (Sunday) to `7` (Sunday again). Six- and seven-field expressions
    /// are handed to the `cron` crate as is, where weekdays run `1` (Sunday)
    /// to `7` (Saturday).
    pub fn parse(expression: &str, timezone: &str) -> Result<Self> {
        let normalized = normalize_expression(expression)?;
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| Error::ConfigError(format!("Invalid schedule '{}': {}", expression, e)))?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|e| Error::ConfigError(format!("Invalid timezone '{}': {}", timezone, e)))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.schedule.after(&now.with_timezone(&self.timezone)).next()
    }

    /// Fire time following `fired`, given the wall clock reads `now`.
    ///
    /// Never returns `fired` again, even when `now` has stepped back before it.
    pub fn following(&self, fired: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.next_after(fired.max(now))
    }
}

fn normalize_expression(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let weekdays = crontab_weekdays(fields[4]).map_err(|reason| {
                Error::ConfigError(format!("Invalid day-of-week in '{}': {}", expression, reason))
            })?;
            Ok(format!("0 {} {}", fields[..4].join(" "), weekdays))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(Error::ConfigError(format!(
            "Schedule '{}' has {} fields; expected 5, 6 or 7",
            expression, n
        ))),
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Rewrite a crontab day-of-week field as explicit day names.
///
/// Handles lists, ranges, steps and names; `7` is Sunday.
fn crontab_weekdays(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((base, step)) => {
                let step: usize = step.parse().map_err(|_| format!("bad step '{}'", step))?;
                if step == 0 {
                    return Err("step must be at least 1".to_string());
                }
                (base, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = match base {
            "*" => (0, 6),
            _ => match base.split_once('-') {
                Some((a, b)) => (weekday_number(a)?, weekday_number(b)?),
                // `5/2` runs from Friday to the end of the week
                None if step.is_some() => (weekday_number(base)?, 6),
                None => {
                    let day = weekday_number(base)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("range '{}' runs backwards", base));
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }

    let names: Vec<&str> = WEEKDAY_NAMES
        .iter()
        .zip(days)
        .filter_map(|(name, on)| on.then_some(*name))
        .collect();
    if names.is_empty() {
        return Err(format!("'{}' selects no days", field));
    }
    Ok(names.join(","))
}

/// `0..=7` or a day name, with `7` kept distinct so `5-7` stays a valid range
fn weekday_number(token: &str) -> std::result::Result<usize, String> {
    if let Ok(n) = token.parse::<usize>() {
        return if n <= 7 { Ok(n) } else { Err(format!("'{}' is out of range", token)) };
    }
    let lower = token.to_ascii_lowercase();
    WEEKDAY_NAMES
        .iter()
        .position(|name| lower.get(..3).is_some_and(|prefix| name.eq_ignore_ascii_case(prefix)))
        .ok_or_else(|| format!("'{}' is not a day of the week", token))
}

/// Request a startup generation when no artifact exists yet.
pub fn generate_if_missing(generator: &Arc<Generator>) -> Option<JoinHandle<Result<crate::CycleReport>>> {
    let store = generator.store();
    if store.exists() {
        info!("Daily image exists at: {}", store.path().display());
        return None;
    }
    info!("No {} found, generating initial image...", store.path().display());
    generator.request_generation(Trigger::StartupMiss)
}

/// Spawn the timer loop that requests a generation at every fire time.
pub fn spawn_daily(generator: Arc<Generator>, schedule: DailySchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut next = schedule.next_after(Utc::now());
        loop {
            let Some(fire) = next else {
                warn!("Schedule '{}' has no upcoming fire time; timer stopped", schedule.expression());
                return;
            };

            info!("Next generation scheduled for {} ({})", fire, schedule.timezone());
            let fire = fire.with_timezone(&Utc);
            let wait = (fire - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            info!("[{}] Daily timer fired - generating wallpaper", Utc::now().to_rfc3339());
            generator.request_generation(Trigger::Timer);

            next = schedule.following(fire, Utc::now());
        }
    })
}
