use std::cell::Cell;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "FOCUSBOARD_TIMEZONE";

/// Source of the current instant.
///
/// Managers never read the wall clock
/// directly so tests can pin time.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

#[derive(Debug)]
pub struct FixedClock {
  now: Cell<DateTime<Utc>>
}

impl FixedClock {
  pub fn new(
    now: DateTime<Utc>
  ) -> Self {
    Self {
      now: Cell::new(now)
    }
  }

  pub fn set(
    &self,
    now: DateTime<Utc>
  ) {
    self.now.set(now);
  }

  pub fn advance(
    &self,
    by: Duration
  ) {
    self.now.set(self.now.get() + by);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.now.get()
  }
}

/// Calendar arithmetic in the user's
/// timezone.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
  tz: Tz
}

impl Default for Calendar {
  fn default() -> Self {
    Self::utc()
  }
}

impl Calendar {
  pub fn new(tz: Tz) -> Self {
    Self { tz }
  }

  pub fn utc() -> Self {
    Self::new(chrono_tz::UTC)
  }

  pub fn from_name(
    name: &str
  ) -> anyhow::Result<Self> {
    let tz = name
      .trim()
      .parse::<Tz>()
      .map_err(|err| {
        anyhow!(
          "invalid timezone \
           {name:?}: {err}"
        )
      })?;
    Ok(Self::new(tz))
  }

  /// Environment first, then the
  /// configured name, then UTC.
  #[tracing::instrument]
  pub fn resolve(
    configured: Option<&str>
  ) -> Self {
    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
    {
      match Self::from_name(&raw) {
        | Ok(cal) => return cal,
        | Err(err) => {
          tracing::warn!(
            env = TIMEZONE_ENV_VAR,
            error = %err,
            "ignoring timezone from \
             environment"
          );
        }
      }
    }

    if let Some(name) = configured {
      match Self::from_name(name) {
        | Ok(cal) => return cal,
        | Err(err) => {
          tracing::warn!(
            error = %err,
            "ignoring configured \
             timezone; using UTC"
          );
        }
      }
    }

    Self::utc()
  }

  pub fn timezone(&self) -> Tz {
    self.tz
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    now.with_timezone(&self.tz)
      .date_naive()
  }

  /// Most recent Sunday, today
  /// included.
  #[must_use]
  pub fn week_start(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    let today = self.today(now);
    let back = today
      .weekday()
      .num_days_from_sunday();
    today
      - Duration::days(i64::from(back))
  }

  #[must_use]
  pub fn display_date(
    &self,
    now: DateTime<Utc>
  ) -> String {
    now.with_timezone(&self.tz)
      .format("%-m/%-d/%Y")
      .to_string()
  }
}

fn relative_offset_re()
-> &'static Result<Regex, regex::Error> {
  static RELATIVE_OFFSET: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  RELATIVE_OFFSET.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
    )
  })
}

/// Parses the date forms accepted on
/// the command line: ISO dates,
/// `today`/`tomorrow`/`yesterday`,
/// weekday names (next occurrence)
/// and `+Nd`/`-Nw` offsets.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(
        today + Duration::days(1)
      );
    }
    | "yesterday" => {
      return Ok(
        today - Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  let rel_re = relative_offset_re()
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .unwrap_or_default()
      .parse()
      .context(
        "invalid relative offset"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => num * 7,
      | _ => num
    };
    let signed = match caps
      .name("sign")
      .map(|m| m.as_str())
    {
      | Some("-") => -days,
      | _ => days
    };
    return today
      .checked_add_signed(
        Duration::days(signed)
      )
      .ok_or_else(|| {
        anyhow!(
          "date offset out of range: \
           {token}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {token}"
    )
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
