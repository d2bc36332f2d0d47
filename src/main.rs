#[macro_use]
extern crate clap;

use {
    anyhow::{bail, Context, Result},
    log::{error, info},
    simplelog::{Config as LogConfig, LevelFilter, TermLogger, TerminalMode},
    wrf_prep::{
        assemble::{assemble, Assembly},
        parameters::{DomainRequest, Parameters},
        validate,
        workflow::{self, RunPlan},
    },
};

#[quit::main]
fn main() {
    let matches = clap_app!(wrf_prep =>
        (version: crate_version!())
        (about: "Validates WRF run parameters and writes namelist.wps and namelist.input for each phase of a run.")
        (@arg PARAMETERS: -p --parameters +takes_value +required "Path to file containing run parameters, YAML or TOML (.toml extension).")
        (@arg START: --start +takes_value "Overrides time_control.start_date.")
        (@arg END: --end +takes_value "Overrides time_control.end_date.")
        (@arg DOMAINS: --domains +takes_value "Comma-separated domains to run, overriding the domains parameter.")
        (@subcommand check =>
            (about: "Validates the parameters and prints the run phases and expected output files.")
        )
        (@subcommand geogrid =>
            (about: "Writes the namelists for geogrid.exe and lists the static data files to trim and renumber afterwards.")
        )
        (@subcommand real =>
            (about: "Writes the namelists for metgrid.exe and real.exe over the initial domain selection.")
        )
        (@subcommand ndown =>
            (about: "Writes the namelists for ndown.exe, nesting the requested domain in existing output of its parent.")
        )
        (@subcommand wrf =>
            (about: "Writes the namelists for wrf.exe and prints the expected output files with their upload renames.")
        )
    )
    .get_matches();

    TermLogger::init(
        LevelFilter::Debug,
        LogConfig::default(),
        TerminalMode::Mixed,
    )
    .expect("Failed to initialize logger");

    let params = {
        // Should never panic as clap should return an error if the argument was not supplied
        let path = matches
            .value_of("PARAMETERS")
            .expect("Path to parameters file not supplied");

        let mut params = Parameters::from_path(path).unwrap_or_else(|e| {
            error!("{:#}", e);
            quit::with_code(1);
        });

        if let Some(start) = matches.value_of("START") {
            params.time_control.start_date = start.to_owned();
        }
        if let Some(end) = matches.value_of("END") {
            params.time_control.end_date = Some(end.to_owned());
        }
        if let Some(domains) = matches.value_of("DOMAINS") {
            let domains = parse_domains(domains).unwrap_or_else(|e| {
                error!("{:#}", e);
                quit::with_code(1);
            });
            params.domains = Some(DomainRequest::List(domains));
        }

        info!(
            "Successfully loaded run parameters from \"{}\": \n{:#?}",
            path, params
        );

        params
    };

    run_subcommand(matches.subcommand_name(), &params).unwrap_or_else(|e| {
        error!("Error: \"{:#}\"", e);
        quit::with_code(1);
    });
}

fn parse_domains(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .with_context(|| format!("{:?} in --domains is not a domain number", d))
        })
        .collect()
}

fn print_outputs(assembly: &Assembly) {
    let window = assembly.window();
    info!(
        "Integrating from {} to {}, boundary interval {} hours",
        window.effective_start, window.end, window.interval_hours
    );
    for file in assembly.manifest() {
        println!("{}", file);
    }
    if let Some(variables) = &assembly.plan.output_variables {
        println!("keep {}", variables.join(","));
    }
}

fn run_subcommand(subcmd: Option<&str>, params: &Parameters) -> Result<()> {
    let subcmd = match subcmd {
        Some(s) => s,
        None => bail!("No subcommand selected"),
    };

    info!("Starting {}", subcmd);

    let validated = validate::check(params, params.requested_domains().as_deref())?;
    let run = RunPlan::new(params, &validated)?;
    let env = &params.environment;

    match subcmd {
        "check" => {
            info!(
                "Initial domains {:?}, integrated domains {:?}, ndown: {}",
                run.initial.domains(),
                run.integration.domains(),
                run.ndown
            );

            // Assembles every phase without writing anything
            assemble(params, &validated.grid, &run.geogrid_selection())?;
            assemble(params, &validated.grid, &run.initial)?;
            let assembly = assemble(params, &validated.grid, &run.integration)?;
            print_outputs(&assembly);
        }
        "geogrid" => {
            let assembly = assemble(params, &validated.grid, &run.geogrid_selection())?;
            assembly.write(env)?;

            if assembly.uses_noahmp {
                info!(
                    "Noah-MP selected: GEOGRID.TBL in {} must link to GEOGRID.TBL.ARW.noahmp",
                    env.wps_path.join("geogrid").display()
                );
            }
            for name in run.geogrid_unused() {
                println!("remove {}", name);
            }
            for (from, to) in run.geogrid_renames() {
                println!("rename {} {}", from, to);
            }
        }
        "real" => {
            let assembly = assemble(params, &validated.grid, &run.initial)?;
            assembly.write(env)?;
            print_outputs(&assembly);
        }
        "ndown" => {
            if !run.ndown {
                bail!("ndown.input.path is not set, there is no parent output to nest in");
            }

            let mut assembly = assemble(params, &validated.grid, &run.initial)?;
            workflow::prepare_ndown(&mut assembly.wrf)?;
            assembly.write(env)?;
        }
        "wrf" => {
            let mut assembly = assemble(params, &validated.grid, &run.integration)?;
            if run.ndown {
                workflow::finish_ndown(&mut assembly.wrf);
            }
            assembly.write(env)?;

            print_outputs(&assembly);
            for (from, to) in run.upload_renames() {
                println!("rename {} {}", from, to);
            }
        }
        _ => {
            // Should be unreachable due to clap catching this error
            bail!("Unrecognized subcommand");
        }
    }

    info!("Finished {}", subcmd);

    Ok(())
}
