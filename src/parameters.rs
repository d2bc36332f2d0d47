use {
    crate::value::{Field, Value},
    anyhow::{Context, Result},
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    },
};

/// Named fields of one section, scalar or per-domain
pub type FieldMap = BTreeMap<String, Field>;

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub environment: Environment,
    pub time_control: TimeControl,
    /// Domain geometry and map projection, scalar or per-domain
    #[serde(default)]
    pub grid: FieldMap,
    /// Requested domains, all when absent
    #[serde(default)]
    pub domains: Option<DomainRequest>,
    #[serde(default)]
    pub physics: FieldMap,
    #[serde(default)]
    pub dynamics: FieldMap,
    #[serde(default)]
    pub fdda: FieldMap,
    /// Verbatim fields keyed by target section name
    #[serde(default)]
    pub namelist_overrides: BTreeMap<String, FieldMap>,
    #[serde(default)]
    pub ndown: Option<Ndown>,
}

impl Parameters {
    /// Loads parameters from a YAML file, or TOML when the extension is `.toml`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let params = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            _ => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        };

        Ok(params)
    }

    /// Requested domain indices, if any were given
    pub fn requested_domains(&self) -> Option<Vec<usize>> {
        self.domains.as_ref().map(DomainRequest::to_vec)
    }

    /// Whether previously produced output is supplied for an ndown restart
    pub fn has_ndown_input(&self) -> bool {
        self.ndown
            .as_ref()
            .and_then(|n| n.input.as_ref())
            .map_or(false, |i| i.path.is_some())
    }
}

/// Locations of the external executables and working data
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Working directory for namelists, intermediate files and output
    pub data_path: PathBuf,
    /// Static geographical data used by geogrid
    pub geog_data_path: PathBuf,
    /// WRF installation, containing `main/*.exe`
    pub wrf_path: PathBuf,
    /// WPS installation, containing `geogrid.exe` and `metgrid.exe`
    pub wps_path: PathBuf,
    /// Read domain geometry from this `namelist.wps` instead of `[grid]`
    pub geometry_namelist: Option<PathBuf>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            data_path: PathBuf::from("/data"),
            geog_data_path: PathBuf::from("/WPS_GEOG"),
            wrf_path: PathBuf::from("/WRF"),
            wps_path: PathBuf::from("/WPS"),
            geometry_namelist: None,
        }
    }
}

impl Environment {
    /// The five executables that must exist before a run, with their names
    pub fn executables(&self) -> [(&'static str, PathBuf); 5] {
        [
            ("wrf.exe", self.wrf_path.join("main/wrf.exe")),
            ("real.exe", self.wrf_path.join("main/real.exe")),
            ("ndown.exe", self.wrf_path.join("main/ndown.exe")),
            ("geogrid.exe", self.wps_path.join("geogrid.exe")),
            ("metgrid.exe", self.wps_path.join("metgrid.exe")),
        ]
    }

    pub fn wps_namelist_path(&self) -> PathBuf {
        self.data_path.join("namelist.wps")
    }

    pub fn wrf_namelist_path(&self) -> PathBuf {
        self.data_path.join("namelist.input")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeControl {
    /// Nominal simulation start, `YYYY-MM-DD HH:MM:SS` or RFC 3339
    pub start_date: String,
    /// Simulation end, takes precedence over `duration_hours`
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<i64>,
    /// Hours between boundary condition updates
    pub interval_hours: i64,
    pub history_file: HistoryFile,
    #[serde(default)]
    pub summary_file: SummaryFile,
    #[serde(default)]
    pub z_level_file: ZLevelFile,
    /// Any other `&time_control` fields, passed through
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryFile {
    /// History write interval in hours, scalar or per-domain
    pub interval_hours: Field<f64>,
    /// Lead-in hours subtracted from the nominal start
    #[serde(default)]
    pub begin_hours: i64,
    /// Variables to keep from the history files, all of them when absent
    #[serde(default)]
    pub output_variables: Option<Vec<String>>,
}

/// Daily extremes output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryFile {
    pub output: bool,
    pub interval_days: i64,
    pub n_days_per_file: i64,
}

impl Default for SummaryFile {
    fn default() -> Self {
        SummaryFile {
            output: false,
            interval_days: 1,
            n_days_per_file: 1,
        }
    }
}

/// Height-level interpolated output
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ZLevelFile {
    pub output: bool,
    /// Heights above ground in metres
    pub z_levels: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DomainRequest {
    Single(usize),
    List(Vec<usize>),
}

impl DomainRequest {
    pub fn to_vec(&self) -> Vec<usize> {
        match self {
            DomainRequest::Single(d) => vec![*d],
            DomainRequest::List(ds) => ds.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Ndown {
    #[serde(default)]
    pub input: Option<NdownInput>,
}

/// Remote location of the parent domain's output
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct NdownInput {
    #[serde(default)]
    pub path: Option<String>,
    /// Remote storage settings, handed to the download collaborator
    #[serde(flatten)]
    pub remote: BTreeMap<String, Value>,
}
