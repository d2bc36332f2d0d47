//! Builds the grid preprocessor's `namelist.wps` and the model's `namelist.input` for a domain
//! selection.
//!
//! Layers, later ones winning:
//!
//! 1. hardcoded defaults
//! 2. the `physics`, `dynamics`, `fdda` parameter sections and `grid`/`time_control` passthrough
//! 3. `namelist_overrides`
//! 4. geometry, derived scalars and everything computed from the time window
//!
//! Derived `&domains` scalars (`time_step`, `parent_time_step_ratio`, `e_vert`,
//! `p_top_requested`) give way to an override of the same name. Geometry, `max_dom` and
//! `grid_id` cannot be overridden, and the run's domain 1 always keeps a time step ratio of 1
//! and a conservative `max_step_increase_pct`.
//!
//! Every per-domain array in layers 2 and 3 that holds one value per configured domain is
//! sliced onto the selection before being written, and every field classified as per-domain
//! is broadcast to exactly one value per selected domain.

use {
    crate::{
        broadcast::DomainSelection,
        defaults::{
            self, DERIVED_DOMAINS_FIELDS, DOMAINS_PER_DOMAIN_FIELDS, DYNAMICS_PER_DOMAIN_FIELDS,
            NOAH_MP, PHYSICS_PER_DOMAIN_FIELDS, ROOT_MAX_STEP_INCREASE_PCT, ROOT_TIME_STEP_RATIO,
        },
        error::{Error, Result},
        geometry::{reproject, DomainTree, Grid},
        namelist::{Namelist, Section},
        parameters::{Environment, FieldMap, Parameters},
        plan::{self, OutputCategory, OutputFile, OutputPlan, TimeWindow, WPS_DATE_FORMAT},
        projection::Projection,
        value::{Field, Value},
    },
    chrono::{Datelike, Timelike},
    log::{debug, info},
    std::{fs, path::Path},
};

/// Namelists and run metadata for one domain selection
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub wps: Namelist,
    pub wrf: Namelist,
    pub plan: OutputPlan,
    pub selection: DomainSelection,
    /// Projection of the run's domain 1
    pub projection: Projection,
    /// Whether any selected domain runs the Noah-MP land surface model
    pub uses_noahmp: bool,
}

impl Assembly {
    pub fn window(&self) -> &TimeWindow {
        &self.plan.window
    }

    pub fn manifest(&self) -> &[OutputFile] {
        &self.plan.manifest
    }

    /// Writes `namelist.wps` and `namelist.input` into the data directory
    pub fn write(&self, env: &Environment) -> Result<()> {
        fs::create_dir_all(&env.data_path)?;

        let wps = env.wps_namelist_path();
        self.wps.write(&wps)?;
        info!("Wrote {}", wps.display());

        let wrf = env.wrf_namelist_path();
        self.wrf.write(&wrf)?;
        info!("Wrote {}", wrf.display());

        Ok(())
    }
}

/// Integration time step in seconds for a grid spacing of `dx` metres
pub fn time_step(dx: f64) -> i64 {
    (dx * 0.001 * 6.0).round() as i64
}

/// Assembles both namelists for `selection` out of the configured `grid`
pub fn assemble(params: &Parameters, grid: &Grid, selection: &DomainSelection) -> Result<Assembly> {
    if selection.full() != grid.len() {
        return Err(Error::InvalidDomainSelection {
            selection: selection.domains().to_vec(),
            reason: format!(
                "made for {} domains but {} are configured",
                selection.full(),
                grid.len()
            ),
        });
    }

    let domain_overrides = params.namelist_overrides.get("domains");
    if let Some(fields) = domain_overrides {
        if let Some(key) = DERIVED_DOMAINS_FIELDS.iter().find(|&&k| fields.contains_key(k)) {
            return Err(Error::schema(
                "namelist_overrides.domains",
                *key,
                "is derived from the grid and the domain selection, set it under grid instead",
            ));
        }
    }

    let (tree, projection) = reproject(&grid.tree, &grid.projection, selection)?;
    let plan = plan::plan(&params.time_control, selection)?;
    let env = &params.environment;

    let wps = wps_namelist(env, &tree, &projection, &plan.window);

    let mut wrf = Namelist::new();
    wrf.push(layer(defaults::time_control(), &params.time_control.extra, selection));
    wrf.push(layer(defaults::domains(), &grid.extra, selection));
    wrf.push(layer(defaults::physics(), &params.physics, selection));
    wrf.push(layer(Section::new("fdda"), &params.fdda, selection));
    wrf.push(layer(defaults::dynamics(), &params.dynamics, selection));
    wrf.push(defaults::bdy_control());
    wrf.push(Section::new("diags"));
    wrf.push(Section::new("grib2"));
    wrf.push(defaults::namelist_quilt());

    for (name, fields) in &params.namelist_overrides {
        debug!("Applying {} overrides to &{}", fields.len(), name);
        let section = wrf.section_mut(name);
        for (key, value) in fields {
            section.set(key.as_str(), selection.slice(value));
        }
    }

    broadcast_fields(wrf.section_mut("domains"), &DOMAINS_PER_DOMAIN_FIELDS, selection)?;
    broadcast_fields(wrf.section_mut("physics"), &PHYSICS_PER_DOMAIN_FIELDS, selection)?;
    broadcast_fields(wrf.section_mut("dynamics"), &DYNAMICS_PER_DOMAIN_FIELDS, selection)?;
    nudging(wrf.section_mut("fdda"), &plan.window, selection)?;

    set_domains(
        wrf.section_mut("domains"),
        grid,
        &tree,
        &projection,
        selection,
        domain_overrides,
    )?;
    set_time(&mut wrf, &plan, selection.len());

    let uses_noahmp = wrf
        .get("physics", "sf_surface_physics")
        .map_or(false, |f| f.to_vec().iter().any(|v| v.as_i64() == Some(NOAH_MP)));

    info!(
        "Assembled {} domains {:?}: dx = {}, time_step = {}",
        selection.len(),
        selection.domains(),
        projection.dx,
        wrf.get("domains", "time_step")
            .map_or_else(String::new, ToString::to_string)
    );

    Ok(Assembly {
        wps,
        wrf,
        plan,
        selection: selection.clone(),
        projection,
        uses_noahmp,
    })
}

/// `section` with `fields` set over it, sliced onto the selection
fn layer(mut section: Section, fields: &FieldMap, selection: &DomainSelection) -> Section {
    for (key, value) in fields {
        section.set(key.as_str(), selection.slice(value));
    }
    section
}

/// Expands each of `names` present in `section` to one value per selected domain
fn broadcast_fields(
    section: &mut Section,
    names: &[&str],
    selection: &DomainSelection,
) -> Result<()> {
    for &name in names {
        if let Some(field) = section.get(name) {
            let values = selection.broadcast(&format!("{}.{}", section.name(), name), field)?;
            section.set(name, Field::PerDomain(values));
        }
    }
    Ok(())
}

/// Fills the per-domain nudging fields and zeroes them wherever `grid_fdda` is off
fn nudging(fdda: &mut Section, window: &TimeWindow, selection: &DomainSelection) -> Result<()> {
    let grid_fdda = match fdda.get("grid_fdda") {
        Some(field) => selection.broadcast("fdda.grid_fdda", field)?,
        None => return Ok(()),
    };

    let nudged = grid_fdda
        .iter()
        .map(|v| match v {
            Value::Bool(b) => *b,
            v => v.as_f64().map_or(false, |x| x != 0.0),
        })
        .collect::<Vec<bool>>();
    fdda.set("grid_fdda", Field::PerDomain(grid_fdda));

    let per_domain = defaults::fdda_per_domain(window.run_hours(), window.interval_hours * 60);
    for (name, default) in per_domain.entries() {
        let field = fdda.get(name).unwrap_or(default);
        let values = selection
            .broadcast(&format!("fdda.{}", name), field)?
            .into_iter()
            .zip(&nudged)
            .map(|(v, &on)| if on { v } else { v.zeroed() })
            .collect::<Vec<Value>>();
        fdda.set(name, Field::PerDomain(values));
    }

    if nudged.contains(&true) {
        for (name, value) in defaults::fdda_io().entries() {
            if !fdda.contains(name) {
                fdda.set(name, value.clone());
            }
        }
    }

    Ok(())
}

/// Geometry and derived scalars of `&domains`
///
/// `overrides` are the `namelist_overrides.domains` fields, already set on `domains`.
fn set_domains(
    domains: &mut Section,
    grid: &Grid,
    tree: &DomainTree,
    projection: &Projection,
    selection: &DomainSelection,
    overrides: Option<&FieldMap>,
) -> Result<()> {
    let n = selection.len();
    let overridden = |key: &str| overrides.map_or(false, |o| o.contains_key(key));

    domains.set("max_dom", Field::scalar(n));
    domains.set("parent_id", Field::per_domain(tree.parent_ids()));
    domains.set("parent_grid_ratio", Field::per_domain(tree.parent_grid_ratios()));
    domains.set("i_parent_start", Field::per_domain(tree.i_parent_starts()));
    domains.set("j_parent_start", Field::per_domain(tree.j_parent_starts()));
    domains.set("e_we", Field::per_domain(tree.e_we()));
    domains.set("e_sn", Field::per_domain(tree.e_sn()));
    domains.set("dx", Field::scalar(projection.dx));
    domains.set("dy", Field::scalar(projection.dy));
    domains.set("grid_id", Field::per_domain(1..=n));

    let derived_step = time_step(projection.dx);
    if overridden("time_step") {
        debug!("time_step override replaces the derived {}", derived_step);
    } else {
        domains.set("time_step", Field::scalar(derived_step));
    }
    if !overridden("e_vert") {
        domains.set(
            "e_vert",
            Field::PerDomain(selection.broadcast("grid.e_vert", &grid.e_vert)?),
        );
    }
    if !overridden("p_top_requested") {
        domains.set("p_top_requested", Field::Scalar(grid.p_top_requested.clone()));
    }

    let mut ratios = match (domains.get("parent_time_step_ratio"), &grid.parent_time_step_ratio) {
        (Some(field), _) if overridden("parent_time_step_ratio") => field.to_vec(),
        (_, Some(field)) => selection.broadcast("grid.parent_time_step_ratio", field)?,
        _ => tree
            .parent_grid_ratios()
            .into_iter()
            .map(Value::from)
            .collect(),
    };
    if let Some(first) = ratios.first_mut() {
        *first = Value::Int(ROOT_TIME_STEP_RATIO);
    }
    domains.set("parent_time_step_ratio", Field::PerDomain(ratios));

    let mut pct = domains
        .get("max_step_increase_pct")
        .map(Field::to_vec)
        .unwrap_or_default();
    if let Some(first) = pct.first_mut() {
        *first = Value::Int(ROOT_MAX_STEP_INCREASE_PCT);
    }
    domains.set("max_step_increase_pct", Field::PerDomain(pct));

    Ok(())
}

/// Everything derived from the time window and the output plan
fn set_time(wrf: &mut Namelist, plan: &OutputPlan, n: usize) {
    let window = &plan.window;
    let repeat = |v: i64| Field::per_domain(vec![v; n]);
    let (start, end) = (window.effective_start, window.end);

    let tc = wrf.section_mut("time_control");
    tc.set("interval_seconds", Field::scalar(window.interval_seconds()));
    tc.set("history_interval", Field::per_domain(plan.history_interval.clone()));
    tc.set("frames_per_outfile", Field::per_domain(plan.frames_per_outfile.clone()));
    tc.set("history_begin", repeat(window.history_begin));
    tc.set("history_outname", Field::scalar(OutputCategory::History.outname()));

    match &plan.summary {
        Some(summary) => {
            tc.set("output_diagnostics", Field::scalar(1i64));
            tc.set("auxhist3_interval", repeat(summary.interval_minutes));
            tc.set("frames_per_auxhist3", repeat(summary.frames_per_file));
            tc.set("auxhist3_outname", Field::scalar(OutputCategory::Summary.outname()));
            tc.set("io_form_auxhist3", Field::scalar(2i64));
            tc.set("auxhist3_begin", repeat(summary.begin_minutes));
        }
        None => tc.set("output_diagnostics", Field::scalar(0i64)),
    }

    if plan.z_levels.is_some() {
        tc.set("auxhist22_outname", Field::scalar(OutputCategory::ZLevel.outname()));
        tc.set("io_form_auxhist22", Field::scalar(2i64));
        tc.set("auxhist22_interval", Field::per_domain(plan.history_interval.clone()));
        tc.set(
            "frames_per_auxhist22",
            Field::per_domain(plan.frames_per_outfile.clone()),
        );
        tc.set("auxhist22_begin", repeat(window.history_begin));
    }

    let dates = [
        ("start_year", i64::from(start.year())),
        ("start_month", i64::from(start.month())),
        ("start_day", i64::from(start.day())),
        ("start_hour", i64::from(start.hour())),
        ("end_year", i64::from(end.year())),
        ("end_month", i64::from(end.month())),
        ("end_day", i64::from(end.day())),
        ("end_hour", i64::from(end.hour())),
    ];
    for &(name, value) in dates.iter() {
        tc.set(name, repeat(value));
    }
    tc.set("input_from_file", Field::per_domain(vec![true; n]));

    let diags = wrf.section_mut("diags");
    match &plan.z_levels {
        Some(levels) => {
            // Negative heights are above ground level rather than sea level
            diags.set("z_lev_diags", Field::scalar(1i64));
            diags.set("z_levels", Field::per_domain(levels.iter().map(|z| -z)));
            diags.set("num_z_levels", Field::scalar(levels.len()));
        }
        None => diags.set("z_lev_diags", Field::scalar(0i64)),
    }

    wrf.section_mut("physics")
        .set("prec_acc_dt", Field::per_domain(plan.history_interval.clone()));
}

fn wps_namelist(
    env: &Environment,
    tree: &DomainTree,
    projection: &Projection,
    window: &TimeWindow,
) -> Namelist {
    let n = tree.len();
    let date = |t: chrono::NaiveDateTime| t.format(WPS_DATE_FORMAT).to_string();

    let mut share = defaults::wps_share();
    share.set("max_dom", Field::scalar(n));
    share.set("start_date", Field::per_domain(vec![date(window.effective_start); n]));
    share.set("end_date", Field::per_domain(vec![date(window.end); n]));
    share.set("interval_seconds", Field::scalar(window.interval_seconds()));
    share.set("opt_output_from_geogrid_path", path(&env.data_path));

    let mut metgrid = defaults::wps_metgrid();
    metgrid.set("fg_name", path(&env.data_path.join("ERA5")));
    metgrid.set("opt_metgrid_tbl_path", path(&env.wps_path.join("metgrid")));
    metgrid.set("opt_output_from_metgrid_path", path(&env.data_path));

    let mut wps = Namelist::new();
    wps.push(share);
    wps.push(geogrid(env, tree, projection));
    wps.push(defaults::wps_ungrib());
    wps.push(metgrid);
    wps
}

fn geogrid(env: &Environment, tree: &DomainTree, projection: &Projection) -> Section {
    let mut geogrid = Section::new("geogrid");

    geogrid.set("parent_id", Field::per_domain(tree.parent_ids()));
    geogrid.set("parent_grid_ratio", Field::per_domain(tree.parent_grid_ratios()));
    geogrid.set("i_parent_start", Field::per_domain(tree.i_parent_starts()));
    geogrid.set("j_parent_start", Field::per_domain(tree.j_parent_starts()));
    geogrid.set("e_we", Field::per_domain(tree.e_we()));
    geogrid.set("e_sn", Field::per_domain(tree.e_sn()));
    geogrid.set("geog_data_res", Field::per_domain(tree.geog_data_res()));
    geogrid.set("dx", Field::scalar(projection.dx));
    geogrid.set("dy", Field::scalar(projection.dy));
    geogrid.set("map_proj", Field::scalar(projection.kind.as_str()));
    geogrid.set("ref_lat", Field::scalar(projection.ref_lat));
    geogrid.set("ref_lon", Field::scalar(projection.ref_lon));
    if let Some(truelat1) = projection.truelat1 {
        geogrid.set("truelat1", Field::scalar(truelat1));
    }
    if let Some(truelat2) = projection.truelat2 {
        geogrid.set("truelat2", Field::scalar(truelat2));
    }
    geogrid.set("stand_lon", Field::scalar(projection.stand_lon));
    geogrid.set("pole_lat", Field::scalar(projection.pole_lat));
    geogrid.set("pole_lon", Field::scalar(projection.pole_lon));
    geogrid.set("geog_data_path", path(&env.geog_data_path));
    geogrid.set("opt_geogrid_tbl_path", path(&env.wps_path.join("geogrid")));

    geogrid
}

fn path(p: &Path) -> Field {
    Field::scalar(p.display().to_string())
}
