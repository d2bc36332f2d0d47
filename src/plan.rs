//! Simulation time window and the output files the model will produce.

use {
    crate::{
        broadcast::DomainSelection,
        defaults::{COORD_VARS_2D, COORD_VARS_3D, VARS_3D},
        error::{Error, Result},
        parameters::TimeControl,
    },
    chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime},
    log::debug,
    std::{collections::BTreeSet, fmt},
};

/// Date format of the preprocessor's `start_date`/`end_date` and of output file names
pub const WPS_DATE_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Kinds of model output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputCategory {
    /// Regular history output
    History,
    /// Daily extremes
    Summary,
    /// Height-level interpolated fields
    ZLevel,
}

impl OutputCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputCategory::History => "wrfout",
            OutputCategory::Summary => "wrfxtrm",
            OutputCategory::ZLevel => "wrfzlevels",
        }
    }

    /// File name template understood by the model
    pub fn outname(&self) -> String {
        format!("{}_d<domain>_<date>.nc", self.prefix())
    }
}

/// An output file the model is expected to write
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputFile {
    pub category: OutputCategory,
    /// Domain number within the run (1 is the run's top domain)
    pub domain: usize,
    /// First time held in the file
    pub timestamp: NaiveDateTime,
}

impl OutputFile {
    pub fn file_name(&self) -> String {
        format!(
            "{}_d{:02}_{}.nc",
            self.category.prefix(),
            self.domain,
            self.timestamp.format(WPS_DATE_FORMAT)
        )
    }
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    /// Start as configured
    pub start: NaiveDateTime,
    /// Start of the integration, `start` less the history lead-in
    pub effective_start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Hours between boundary condition updates
    pub interval_hours: i64,
    /// History lead-in in minutes
    pub history_begin: i64,
}

impl TimeWindow {
    pub fn interval_seconds(&self) -> i64 {
        self.interval_hours * 3600
    }

    /// Hours from the configured start to the end
    pub fn run_hours(&self) -> i64 {
        (self.end - self.start).num_hours()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPlan {
    pub interval_minutes: i64,
    pub frames_per_file: i64,
    pub begin_minutes: i64,
}

/// Time-control values for the selected domains and the resulting file manifest
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub window: TimeWindow,
    /// History write interval in minutes, per selected domain
    pub history_interval: Vec<i64>,
    /// Frames per history file, per selected domain (0 where history is off)
    pub frames_per_outfile: Vec<i64>,
    pub summary: Option<SummaryPlan>,
    /// Heights in metres for height-level output
    pub z_levels: Option<Vec<f64>>,
    /// Sorted history variables to keep, `None` to keep everything
    pub output_variables: Option<Vec<String>>,
    pub manifest: Vec<OutputFile>,
}

/// Parses a date as written in the parameters file
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]`, the same with a `T` or WPS `_` separator, a bare date, or
/// RFC 3339 with a `Z` or numeric offset, which is converted to UTC.
pub fn parse_datetime(field: &str, s: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        WPS_DATE_FORMAT,
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];

    let s = s.trim();

    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| {
            Error::schema(
                "time_control",
                field,
                format!("{:?} is not a date, expected YYYY-MM-DD HH:MM:SS", s),
            )
        })
}

/// Resolves the time window for `time_control` and lists the output files of `selection`
pub fn plan(time_control: &TimeControl, selection: &DomainSelection) -> Result<OutputPlan> {
    let start = parse_datetime("start_date", &time_control.start_date)?;
    let end = match (&time_control.end_date, time_control.duration_hours) {
        (Some(end), _) => parse_datetime("end_date", end)?,
        (None, Some(hours)) => Duration::try_hours(hours)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| {
                Error::schema(
                    "time_control",
                    "duration_hours",
                    format!("{} hours from {} is out of range", hours, start),
                )
            })?,
        (None, None) => {
            return Err(Error::schema(
                "time_control",
                "end_date",
                "end_date or duration_hours must be given",
            ))
        }
    };

    if start > end {
        return Err(Error::InvalidTimeRange { start, end });
    }

    let interval_hours = time_control.interval_hours;
    if interval_hours <= 0 || interval_hours.checked_mul(3600).is_none() {
        return Err(Error::schema(
            "time_control",
            "interval_hours",
            format!("must be a positive number of hours, got {}", interval_hours),
        ));
    }

    let begin_hours = time_control.history_file.begin_hours;
    let (history_begin, effective_start) = match begin_hours
        .checked_mul(60)
        .filter(|&m| m >= 0)
        .and_then(|m| Some((m, start.checked_sub_signed(Duration::try_minutes(m)?)?)))
    {
        Some(begin) => begin,
        None => {
            return Err(Error::schema(
                "time_control",
                "history_file.begin_hours",
                format!(
                    "must not be negative and {} hours before {} must be a valid date",
                    begin_hours, start
                ),
            ))
        }
    };
    let window = TimeWindow {
        start,
        effective_start,
        end,
        interval_hours: time_control.interval_hours,
        history_begin,
    };

    let history_interval = selection
        .broadcast(
            "history_file.interval_hours",
            &time_control.history_file.interval_hours,
        )?
        .iter()
        .map(|hours| (hours * 60.0).round() as i64)
        .collect::<Vec<i64>>();

    let frames_per_outfile = history_interval
        .iter()
        .zip(selection.domains())
        .map(|(&minutes, &domain)| match minutes {
            0 => Ok(0),
            m if m > 0 && MINUTES_PER_DAY % m == 0 => Ok(MINUTES_PER_DAY / m),
            _ => Err(Error::InvalidHistoryInterval { domain, minutes }),
        })
        .collect::<Result<Vec<i64>>>()?;

    let domains = 1..=selection.len();
    let days = daily(start, end);
    let mut manifest = entries(OutputCategory::History, &days, domains.clone());

    let summary = if time_control.summary_file.output {
        let summary = &time_control.summary_file;
        let midnight = NaiveTime::MIN;

        if start.time() != midnight || end.time() != midnight {
            return Err(Error::SummaryAlignment { start, end });
        }

        let run_days = (end - start).num_days();
        let mismatch = |reason| Error::SummaryPeriodMismatch {
            n_days_per_file: summary.n_days_per_file,
            interval_days: summary.interval_days,
            run_days,
            reason,
        };

        if summary.interval_days <= 0 {
            return Err(mismatch("interval_days must be positive"));
        }
        if summary.n_days_per_file < summary.interval_days {
            return Err(mismatch("n_days_per_file must be >= interval_days"));
        }
        if summary.n_days_per_file > run_days.max(1) {
            return Err(mismatch("n_days_per_file must not exceed the run length"));
        }
        if run_days % summary.n_days_per_file != 0 {
            return Err(mismatch(
                "n_days_per_file must divide evenly into the run length",
            ));
        }

        // Each file is stamped with the end of its first day
        let stamps = (0..run_days / summary.n_days_per_file)
            .map(|k| start + Duration::days(1 + k * summary.n_days_per_file))
            .collect::<Vec<_>>();
        manifest.extend(entries(OutputCategory::Summary, &stamps, domains.clone()));

        Some(SummaryPlan {
            interval_minutes: summary.interval_days * MINUTES_PER_DAY,
            frames_per_file: summary.n_days_per_file / summary.interval_days,
            begin_minutes: history_begin + MINUTES_PER_DAY,
        })
    } else {
        None
    };

    let z_levels = if time_control.z_level_file.output {
        if time_control.z_level_file.z_levels.is_empty() {
            return Err(Error::schema(
                "time_control",
                "z_level_file.z_levels",
                "at least one height is required when output is enabled",
            ));
        }
        manifest.extend(entries(OutputCategory::ZLevel, &days, domains));
        Some(time_control.z_level_file.z_levels.clone())
    } else {
        None
    };

    let output_variables = match &time_control.history_file.output_variables {
        Some(requested) if !requested.is_empty() => Some(resolve_output_variables(requested)),
        _ => None,
    };

    debug!(
        "Planned {} to {} (effective start {}), {} output files",
        window.start,
        window.end,
        window.effective_start,
        manifest.len()
    );

    Ok(OutputPlan {
        window,
        history_interval,
        frames_per_outfile,
        summary,
        z_levels,
        output_variables,
        manifest,
    })
}

/// Requested history variables plus the coordinates needed to use them, sorted and unique
///
/// Time and horizontal coordinates are always kept. Pressure, geopotential and terrain height
/// are added when any variable on model levels is requested.
pub fn resolve_output_variables<S: AsRef<str>>(requested: &[S]) -> Vec<String> {
    let mut variables = requested
        .iter()
        .map(|v| v.as_ref().trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<String>>();

    let on_levels = variables.iter().any(|v| VARS_3D.contains(&v.as_str()));

    variables.extend(COORD_VARS_2D.iter().map(|&v| v.to_owned()));
    if on_levels {
        variables.extend(COORD_VARS_3D.iter().map(|&v| v.to_owned()));
    }

    variables.into_iter().collect()
}

/// Start of each day-long file from `start` until the minute before `end`
fn daily(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut days = vec![];
    let last = match end.checked_sub_signed(Duration::minutes(1)) {
        Some(last) => last,
        None => return days,
    };
    let mut t = Some(start);
    while let Some(day) = t.filter(|&day| day <= last) {
        days.push(day);
        t = day.checked_add_signed(Duration::days(1));
    }
    days
}

fn entries<I: Iterator<Item = usize> + Clone>(
    category: OutputCategory,
    stamps: &[NaiveDateTime],
    domains: I,
) -> Vec<OutputFile> {
    stamps
        .iter()
        .flat_map(|&timestamp| {
            domains.clone().map(move |domain| OutputFile {
                category,
                domain,
                timestamp,
            })
        })
        .collect()
}
