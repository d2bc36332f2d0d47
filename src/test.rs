use {
    crate::{
        assemble::{assemble, Assembly},
        broadcast::DomainSelection,
        geometry::Grid,
        namelist::Namelist,
        parameters::Parameters,
        plan::OutputCategory,
        validate::{self, read_grid},
        value::{Field, Value},
        workflow::{self, RunPlan},
    },
    lazy_static::lazy_static,
    std::fs,
    tempdir::TempDir,
};

lazy_static! {
    static ref PARAMETERS: Parameters =
        Parameters::from_path("src/testdata/parameters.yaml").unwrap();
    static ref GRID: Grid = read_grid(&PARAMETERS.grid).unwrap();
    static ref ALL: Assembly = assemble(&PARAMETERS, &GRID, &DomainSelection::all(3)).unwrap();
    static ref SUBSET: Assembly = assemble(
        &PARAMETERS,
        &GRID,
        &DomainSelection::new(vec![1, 2], 3).unwrap()
    )
    .unwrap();
    static ref SUMMARY: Assembly = {
        let mut params = PARAMETERS.clone();
        params.time_control.summary_file.output = true;
        params.time_control.summary_file.interval_days = 1;
        params.time_control.summary_file.n_days_per_file = 1;
        assemble(&params, &GRID, &DomainSelection::all(3)).unwrap()
    };
}

fn get<'a>(namelist: &'a Namelist, section: &str, key: &str) -> &'a Field {
    namelist
        .get(section, key)
        .unwrap_or_else(|| panic!("&{} {} missing", section, key))
}

fn first_int(namelist: &Namelist, section: &str, key: &str) -> i64 {
    get(namelist, section, key)
        .first()
        .and_then(Value::as_i64)
        .unwrap()
}

/// Fake installation with all five executables present
fn installation(params: &mut Parameters) -> TempDir {
    let dir = TempDir::new("wrf-prep").unwrap();
    params.environment.data_path = dir.path().join("data");
    params.environment.wrf_path = dir.path().join("WRF");
    params.environment.wps_path = dir.path().join("WPS");

    for (_, path) in params.environment.executables().iter() {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    dir
}

mod all_domains {
    use super::*;

    #[test]
    fn max_dom() {
        assert_eq!(first_int(&ALL.wrf, "domains", "max_dom"), 3);
        assert_eq!(first_int(&ALL.wps, "share", "max_dom"), 3);
    }

    #[test]
    fn grid_id() {
        assert_eq!(
            get(&ALL.wrf, "domains", "grid_id"),
            &Field::per_domain(vec![1i64, 2, 3])
        );
    }

    #[test]
    fn parent_time_step_ratio() {
        assert_eq!(first_int(&ALL.wrf, "domains", "parent_time_step_ratio"), 1);
        assert_eq!(
            get(&ALL.wrf, "domains", "parent_time_step_ratio"),
            &Field::per_domain(vec![1i64, 3, 3])
        );
    }

    #[test]
    fn time_step() {
        assert_eq!(first_int(&ALL.wrf, "domains", "time_step"), 162);
    }

    #[test]
    fn max_step_increase_pct() {
        assert_eq!(
            get(&ALL.wrf, "domains", "max_step_increase_pct"),
            &Field::per_domain(vec![5i64, 51, 51])
        );
    }

    #[test]
    fn geometry_untouched() {
        assert_eq!(ALL.projection, GRID.projection);
        assert_eq!(
            get(&ALL.wps, "geogrid", "ref_lat"),
            &Field::scalar(-40.0)
        );
        assert_eq!(
            get(&ALL.wrf, "domains", "i_parent_start"),
            &Field::per_domain(vec![1i64, 30, 10])
        );
    }

    #[test]
    fn time_control() {
        let wrf = &ALL.wrf;
        assert_eq!(first_int(wrf, "time_control", "interval_seconds"), 10800);
        assert_eq!(
            get(wrf, "time_control", "history_interval"),
            &Field::per_domain(vec![60i64, 60, 60])
        );
        assert_eq!(
            get(wrf, "time_control", "frames_per_outfile"),
            &Field::per_domain(vec![24i64, 24, 24])
        );
        assert_eq!(
            get(wrf, "time_control", "end_day"),
            &Field::per_domain(vec![3i64, 3, 3])
        );
        assert_eq!(first_int(wrf, "time_control", "output_diagnostics"), 0);
        assert_eq!(first_int(wrf, "diags", "z_lev_diags"), 0);
    }

    #[test]
    fn manifest() {
        let names = ALL
            .manifest()
            .iter()
            .map(|f| f.file_name())
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                "wrfout_d01_2020-01-01_00:00:00.nc",
                "wrfout_d02_2020-01-01_00:00:00.nc",
                "wrfout_d03_2020-01-01_00:00:00.nc",
                "wrfout_d01_2020-01-02_00:00:00.nc",
                "wrfout_d02_2020-01-02_00:00:00.nc",
                "wrfout_d03_2020-01-02_00:00:00.nc",
            ]
        );
    }
}

mod domain_subset {
    use super::*;

    #[test]
    fn max_dom() {
        assert_eq!(first_int(&SUBSET.wrf, "domains", "max_dom"), 2);
        assert_eq!(first_int(&SUBSET.wps, "share", "max_dom"), 2);
    }

    #[test]
    fn per_domain_lengths() {
        let per_domain = [
            ("domains", "grid_id"),
            ("domains", "e_we"),
            ("domains", "e_vert"),
            ("domains", "parent_time_step_ratio"),
            ("domains", "target_cfl"),
            ("physics", "mp_physics"),
            ("physics", "prec_acc_dt"),
            ("dynamics", "epssm"),
            ("time_control", "history_interval"),
            ("time_control", "start_year"),
        ];
        for &(section, key) in per_domain.iter() {
            assert_eq!(get(&SUBSET.wrf, section, key).len(), 2, "&{} {}", section, key);
        }
        for &key in ["e_sn", "geog_data_res", "parent_id"].iter() {
            assert_eq!(get(&SUBSET.wps, "geogrid", key).len(), 2, "&geogrid {}", key);
        }
        assert_eq!(get(&SUBSET.wps, "share", "start_date").len(), 2);
    }

    #[test]
    fn manifest() {
        assert_eq!(SUBSET.manifest().len(), 4);
        assert!(SUBSET.manifest().iter().all(|f| f.domain <= 2));
    }
}

mod summary_output {
    use super::*;

    #[test]
    fn enabled() {
        assert_eq!(first_int(&SUMMARY.wrf, "time_control", "output_diagnostics"), 1);
        assert!(SUMMARY.plan.summary.is_some());
    }

    #[test]
    fn frames_per_file() {
        assert_eq!(
            get(&SUMMARY.wrf, "time_control", "frames_per_auxhist3"),
            &Field::per_domain(vec![1i64, 1, 1])
        );
        assert_eq!(
            get(&SUMMARY.wrf, "time_control", "auxhist3_begin"),
            &Field::per_domain(vec![1440i64, 1440, 1440])
        );
    }

    #[test]
    fn manifest() {
        let count = |category: OutputCategory| {
            SUMMARY
                .manifest()
                .iter()
                .filter(|f| f.category == category)
                .count()
        };

        assert_eq!(count(OutputCategory::History), 6);
        assert_eq!(count(OutputCategory::Summary), 6);
        assert_eq!(SUMMARY.manifest().len(), 12);
    }
}

mod validator {
    use super::*;

    #[test]
    fn nesting() {
        let mut params = PARAMETERS.clone();
        let _dir = installation(&mut params);

        let validated = validate::check(&params, Some(&[1, 2, 3])).unwrap();
        assert_eq!(validated.full(), 3);
        assert_eq!(validated.selection, DomainSelection::all(3));

        assert!(matches!(
            validate::check(&params, Some(&[2, 3])),
            Err(crate::error::Error::NestingViolation { .. })
        ));
    }
}

mod ndown_run {
    use {super::*, crate::parameters::{Ndown, NdownInput}};

    #[test]
    fn phases() {
        let mut params = PARAMETERS.clone();
        let _dir = installation(&mut params);
        params.ndown = Some(Ndown {
            input: Some(NdownInput {
                path: Some("bucket/wrf/parent".to_owned()),
                ..NdownInput::default()
            }),
        });

        let validated = validate::check(&params, Some(&[3])).unwrap();
        let run = RunPlan::new(&params, &validated).unwrap();

        let geogrid = assemble(&params, &validated.grid, &run.geogrid_selection()).unwrap();
        assert_eq!(first_int(&geogrid.wps, "share", "max_dom"), 3);

        let mut initial = assemble(&params, &validated.grid, &run.initial).unwrap();
        assert_eq!(first_int(&initial.wrf, "domains", "time_step"), 54);
        workflow::prepare_ndown(&mut initial.wrf).unwrap();
        assert_eq!(first_int(&initial.wrf, "time_control", "interval_seconds"), 3600);

        let mut last = assemble(&params, &validated.grid, &run.integration).unwrap();
        workflow::finish_ndown(&mut last.wrf);
        last.write(&params.environment).unwrap();

        let written = Namelist::read(params.environment.wrf_namelist_path()).unwrap();
        assert_eq!(first_int(&written, "domains", "max_dom"), 1);
        assert_eq!(first_int(&written, "domains", "time_step"), 18);
        assert_eq!(
            written.get("bdy_control", "have_bcs_scalar"),
            Some(&Field::scalar(true))
        );
        assert_eq!(last.manifest().len(), 2);
        assert_eq!(
            run.upload_renames(),
            vec![("_d01_".to_owned(), "_d03_".to_owned())]
        );
    }
}
