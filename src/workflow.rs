//! Domain selections for each phase of a run and the file renames between them.
//!
//! A plain run uses the same selection throughout. An ndown run nests domain `d` inside
//! previously produced output of its parent: the preprocessor, `real.exe` and `ndown.exe` see
//! `[parent, d]`, after which the model integrates `d` alone as its domain 1.

use {
    crate::{
        broadcast::DomainSelection,
        error::{Error, Result},
        namelist::Namelist,
        parameters::Parameters,
        validate::Validated,
        value::{Field, Value},
    },
    log::info,
};

/// `(from, to)` file name pairs
pub type Renames = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// Selection for the preprocessor and `real.exe`
    pub initial: DomainSelection,
    /// Selection integrated by the model
    pub integration: DomainSelection,
    /// Whether `ndown.exe` runs between the two
    pub ndown: bool,
}

impl RunPlan {
    /// Resolves the run phases, an ndown run when `ndown.input.path` is configured
    pub fn new(params: &Parameters, validated: &Validated) -> Result<Self> {
        let selection = &validated.selection;

        if !params.has_ndown_input() {
            return Ok(Self {
                initial: selection.clone(),
                integration: selection.clone(),
                ndown: false,
            });
        }

        let domain = match selection.domains() {
            &[d] if d != 1 => d,
            _ => {
                return Err(Error::InvalidDomainSelection {
                    selection: selection.domains().to_vec(),
                    reason: "ndown input requires a single requested domain other than domain 1"
                        .to_owned(),
                })
            }
        };
        let parent_id = validated.grid.tree.get(domain).map_or(1, |d| d.parent_id);

        info!(
            "ndown run: domain {} nested in output of domain {}",
            domain, parent_id
        );

        Ok(Self {
            initial: DomainSelection::new(vec![parent_id, domain], selection.full())?,
            integration: selection.clone(),
            ndown: true,
        })
    }

    /// Selection for the grid preprocessor
    ///
    /// The preprocessor derives nests from domain 1, so anything other than a leading run of
    /// domains is generated in full and trimmed afterwards.
    pub fn geogrid_selection(&self) -> DomainSelection {
        if self.initial.is_leading_run() {
            self.initial.clone()
        } else {
            DomainSelection::all(self.initial.full())
        }
    }

    /// Static data files produced by the preprocessor that the initial phase does not use
    pub fn geogrid_unused(&self) -> Vec<String> {
        if self.initial.is_leading_run() {
            return vec![];
        }
        (1..=self.initial.full())
            .filter(|&d| self.initial.position(d).is_none())
            .map(geo_em)
            .collect()
    }

    /// Renumbers the preprocessor's static data files onto the initial selection
    pub fn geogrid_renames(&self) -> Renames {
        if self.initial.is_leading_run() {
            return vec![];
        }
        self.initial
            .domains()
            .iter()
            .enumerate()
            .map(|(i, &d)| (geo_em(d), geo_em(i + 1)))
            .collect()
    }

    /// Maps the model's output domain numbers back onto the configured domains for upload
    pub fn upload_renames(&self) -> Renames {
        if self.ndown {
            vec![("_d01_".to_owned(), tag(self.integration.top()))]
        } else {
            self.integration
                .domains()
                .iter()
                .enumerate()
                .map(|(i, &d)| (tag(i + 1), tag(d)))
                .collect()
        }
    }
}

/// Adjusts the initial phase's `namelist.input` for `ndown.exe`
///
/// The parent output is read at its history interval, so that becomes the input interval.
pub fn prepare_ndown(wrf: &mut Namelist) -> Result<()> {
    let history = wrf
        .get("time_control", "history_interval")
        .and_then(Field::first)
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            Error::schema("time_control", "history_interval", "missing from the namelist")
        })?;

    let tc = wrf.section_mut("time_control");
    tc.set("io_form_auxinput2", Field::scalar(2i64));
    tc.set("fine_input_stream", Field::per_domain(vec![0i64, 2]));
    tc.set("interval_seconds", Field::scalar(history * 60));

    Ok(())
}

/// Adjusts the integration phase's `namelist.input` to read the boundaries `ndown.exe` wrote
pub fn finish_ndown(wrf: &mut Namelist) {
    let bdy = wrf.section_mut("bdy_control");
    bdy.set("have_bcs_moist", Field::scalar(true));
    bdy.set("have_bcs_scalar", Field::scalar(true));

    wrf.section_mut("time_control")
        .set("io_form_auxinput2", Field::scalar(2i64));
}

fn geo_em(domain: usize) -> String {
    format!("geo_em.d{:02}.nc", domain)
}

fn tag(domain: usize) -> String {
    format!("_d{:02}_", domain)
}
