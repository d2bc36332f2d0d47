//! Default namelist values and field classification.
//!
//! Input is always ERA5 on the ARW core, so the I/O sections are fixed. Physics and dynamics
//! defaults are starting points that the `physics` and `dynamics` parameter sections override.

use crate::{namelist::Section, value::Field};

macro_rules! section {
    ($name:expr, { $($key:expr => $value:expr),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut section = Section::new($name);
        $(section.set($key, Field::scalar($value));)*
        section
    }};
}

/// Geometry fields holding one value per configured domain
pub const GEOGRID_ARRAY_FIELDS: [&str; 6] = [
    "parent_id",
    "parent_grid_ratio",
    "i_parent_start",
    "j_parent_start",
    "e_we",
    "e_sn",
];

/// Geometry fields that must be a single value
pub const GEOGRID_SINGLE_FIELDS: [&str; 6] = ["dx", "dy", "map_proj", "ref_lat", "ref_lon", "stand_lon"];

/// Optional grid fields consumed here rather than passed through to `&domains`
pub const GRID_OPTIONAL_FIELDS: [&str; 8] = [
    "geog_data_res",
    "truelat1",
    "truelat2",
    "pole_lat",
    "pole_lon",
    "e_vert",
    "p_top_requested",
    "parent_time_step_ratio",
];

pub const DEFAULT_E_VERT: i64 = 33;
pub const DEFAULT_P_TOP: i64 = 5000;
pub const DEFAULT_GEOG_DATA_RES: &str = "default";
pub const DEFAULT_POLE_LAT: f64 = 90.0;
pub const DEFAULT_POLE_LON: f64 = 0.0;
pub const MIN_GRID_POINTS: i64 = 100;

/// `&domains` fields given per domain
pub const DOMAINS_PER_DOMAIN_FIELDS: [&str; 7] = [
    "target_cfl",
    "max_step_increase_pct",
    "starting_time_step",
    "max_time_step",
    "min_time_step",
    "e_vert",
    "parent_time_step_ratio",
];

/// `&physics` fields given per domain
pub const PHYSICS_PER_DOMAIN_FIELDS: [&str; 11] = [
    "mp_physics",
    "cu_physics",
    "ra_lw_physics",
    "ra_sw_physics",
    "bl_pbl_physics",
    "sf_sfclay_physics",
    "sf_surface_physics",
    "radt",
    "bldt",
    "cudt",
    "sf_urban_physics",
];

/// `&dynamics` fields given per domain
pub const DYNAMICS_PER_DOMAIN_FIELDS: [&str; 13] = [
    "diff_opt",
    "km_opt",
    "diff_6th_opt",
    "diff_6th_factor",
    "zdamp",
    "dampcoef",
    "khdif",
    "kvdif",
    "non_hydrostatic",
    "moist_adv_opt",
    "scalar_adv_opt",
    "gwd_opt",
    "epssm",
];

/// `&domains` fields always derived from the grid and the selection, never overridden
pub const DERIVED_DOMAINS_FIELDS: [&str; 10] = [
    "max_dom",
    "grid_id",
    "parent_id",
    "parent_grid_ratio",
    "i_parent_start",
    "j_parent_start",
    "e_we",
    "e_sn",
    "dx",
    "dy",
];

/// Time step ratio and adaptive step increase forced on the run's domain 1
pub const ROOT_TIME_STEP_RATIO: i64 = 1;
pub const ROOT_MAX_STEP_INCREASE_PCT: i64 = 5;

/// History variables kept whenever output is filtered
pub const COORD_VARS_2D: [&str; 4] = ["Times", "XLAT", "XLONG", "XTIME"];

/// Kept as well once any variable on model levels is requested
pub const COORD_VARS_3D: [&str; 5] = ["P", "PB", "PH", "PHB", "HGT"];

/// History variables with a vertical (eta level) dimension
pub const VARS_3D: [&str; 16] = [
    "T", "U", "V", "W", "P", "PB", "PH", "PHB", "QVAPOR", "QCLOUD", "QRAIN", "QICE", "QSNOW",
    "QGRAUP", "QHAIL", "TKE_PBL",
];

/// `sf_surface_physics` option selecting Noah-MP
pub const NOAH_MP: i64 = 4;

pub fn wps_share() -> Section {
    section!("share", {
        "wrf_core" => "ARW",
        "io_form_geogrid" => 2,
        "debug_level" => 0,
    })
}

pub fn wps_ungrib() -> Section {
    section!("ungrib", {
        "out_format" => "WPS",
        "prefix" => "ERA5",
    })
}

pub fn wps_metgrid() -> Section {
    section!("metgrid", {
        "io_form_metgrid" => 2,
    })
}

pub fn time_control() -> Section {
    section!("time_control", {
        "run_days" => 0,
        "run_hours" => 0,
        "run_minutes" => 0,
        "run_seconds" => 0,
        "restart" => false,
        "restart_interval" => 500_000,
        "adjust_output_times" => true,
        "io_form_history" => 2,
        "io_form_restart" => 2,
        "io_form_input" => 2,
        "io_form_boundary" => 2,
        "auxinput4_inname" => "wrflowinp_d<domain>",
        "auxinput4_interval" => 360,
        "io_form_auxinput4" => 2,
    })
}

pub fn domains() -> Section {
    section!("domains", {
        "use_adaptive_time_step" => true,
        "step_to_output_time" => true,
        "target_cfl" => 1.2,
        "max_step_increase_pct" => 51,
        "starting_time_step" => -1,
        "max_time_step" => -1,
        "min_time_step" => -1,
        "adaptation_domain" => 1,
        "time_step_fract_num" => 0,
        "time_step_fract_den" => 1,
        "p_top_requested" => DEFAULT_P_TOP,
        "num_metgrid_levels" => 38,
        "num_metgrid_soil_levels" => 4,
        "feedback" => 0,
        "smooth_option" => 0,
    })
}

pub fn physics() -> Section {
    section!("physics", {
        // WSM6
        "mp_physics" => 6,
        // New Tiedtke
        "cu_physics" => 16,
        // RRTMG
        "ra_lw_physics" => 4,
        "ra_sw_physics" => 4,
        // No PBL scheme, paired with km_opt = 5
        "bl_pbl_physics" => 0,
        // Revised MM5 Monin-Obukhov
        "sf_sfclay_physics" => 1,
        "sf_surface_physics" => NOAH_MP,
        "sf_ocean_physics" => 0,
        "radt" => 30,
        "bldt" => 0,
        "cudt" => 5,
        "icloud" => 1,
        // MODIS
        "num_land_cat" => 21,
        "sf_urban_physics" => 0,
        "sst_update" => 1,
        "usemonalb" => true,
        "sst_skin" => 0,
    })
}

pub fn dynamics() -> Section {
    section!("dynamics", {
        "hybrid_opt" => 2,
        "w_damping" => 1,
        "diff_opt" => 2,
        // SMS-3DTKE
        "km_opt" => 5,
        "diff_6th_opt" => 0,
        "diff_6th_factor" => 0.12,
        "base_temp" => 290.0,
        "damp_opt" => 3,
        "zdamp" => 5000.0,
        "dampcoef" => 0.2,
        "khdif" => 0,
        "kvdif" => 0,
        "non_hydrostatic" => true,
        "moist_adv_opt" => 1,
        "scalar_adv_opt" => 1,
        "gwd_opt" => 1,
        "epssm" => 0.5,
    })
}

pub fn bdy_control() -> Section {
    section!("bdy_control", {
        "spec_bdy_width" => 5,
        "specified" => true,
    })
}

pub fn namelist_quilt() -> Section {
    section!("namelist_quilt", {
        "nio_tasks_per_group" => 0,
        "nio_groups" => 1,
    })
}

/// Per-domain nudging defaults, zeroed wherever `grid_fdda` is off
///
/// `end_hours` and `interval_minutes` come from the run's time window.
pub fn fdda_per_domain(end_hours: i64, interval_minutes: i64) -> Section {
    section!("fdda", {
        "gfdda_end_h" => end_hours,
        "gfdda_interval_m" => interval_minutes,
        "fgdt" => 0,
        "if_no_pbl_nudging_uv" => 1,
        "if_no_pbl_nudging_t" => 1,
        "if_no_pbl_nudging_ph" => 1,
        "if_no_pbl_nudging_q" => 1,
        "guv" => 0.0003,
        "gt" => 0.0003,
        "gq" => 0.00001,
    })
}

/// Set on `&fdda` when at least one domain nudges
pub fn fdda_io() -> Section {
    section!("fdda", {
        "gfdda_inname" => "wrffdda_d<domain>",
        "io_form_gfdda" => 2,
    })
}
