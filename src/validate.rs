//! Checks run before any namelist is written: executables on disk, the shape of the grid
//! configuration and the nesting of the requested domains.

use {
    crate::{
        broadcast::{broadcast, DomainSelection},
        defaults::{
            DEFAULT_E_VERT, DEFAULT_GEOG_DATA_RES, DEFAULT_POLE_LAT, DEFAULT_POLE_LON,
            DEFAULT_P_TOP, GEOGRID_ARRAY_FIELDS, GEOGRID_SINGLE_FIELDS, GRID_OPTIONAL_FIELDS,
            MIN_GRID_POINTS,
        },
        error::{Error, Result},
        geometry::{Domain, DomainTree, Grid},
        namelist::Namelist,
        parameters::{Environment, FieldMap, Parameters},
        projection::{Projection, ProjectionKind},
        value::{Field, Value},
    },
    log::{debug, info},
    std::collections::BTreeMap,
};

/// Configuration that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub grid: Grid,
    pub selection: DomainSelection,
}

impl Validated {
    /// Number of configured domains
    pub fn full(&self) -> usize {
        self.grid.len()
    }
}

/// Validates `params` and resolves the `requested` domains, all domains when `None`
pub fn check(params: &Parameters, requested: Option<&[usize]>) -> Result<Validated> {
    check_executables(&params.environment)?;

    let grid = load_grid(params)?;
    let selection = resolve_selection(&grid.tree, requested)?;

    info!(
        "{} domains configured, selected {:?}",
        grid.len(),
        selection.domains()
    );

    Ok(Validated { grid, selection })
}

pub fn check_executables(env: &Environment) -> Result<()> {
    for (name, path) in env.executables().iter() {
        if !path.is_file() {
            return Err(Error::MissingExecutable {
                name: *name,
                path: path.clone(),
            });
        }
        debug!("found {} at {}", name, path.display());
    }
    Ok(())
}

/// Grid from `[grid]`, with geometry replaced by an existing `namelist.wps` when configured
pub fn load_grid(params: &Parameters) -> Result<Grid> {
    let mut fields = params.grid.clone();

    if let Some(path) = &params.environment.geometry_namelist {
        info!("Reading domain geometry from {}", path.display());
        fields.extend(grid_fields_from_namelist(&Namelist::read(path)?)?);
    }

    read_grid(&fields)
}

/// Geometry fields of a `&geogrid` section
///
/// A namelist written for a single domain holds scalars where the configuration expects
/// arrays, so those become one-element arrays.
pub fn grid_fields_from_namelist(namelist: &Namelist) -> Result<FieldMap> {
    let geogrid = namelist
        .section("geogrid")
        .ok_or_else(|| Error::schema("geogrid", "", "section is missing from the namelist"))?;

    Ok(geogrid
        .entries()
        .filter_map(|(key, field)| {
            if GEOGRID_ARRAY_FIELDS.contains(&key) || key == "geog_data_res" {
                Some((key.to_owned(), Field::PerDomain(field.to_vec())))
            } else if GEOGRID_SINGLE_FIELDS.contains(&key) || GRID_OPTIONAL_FIELDS.contains(&key) {
                Some((key.to_owned(), field.clone()))
            } else {
                None
            }
        })
        .collect())
}

/// Checks the shape of the grid fields and builds the typed domain tree and projection
pub fn read_grid(fields: &FieldMap) -> Result<Grid> {
    let full = required(fields, "parent_id")?.len();
    if full == 0 {
        return Err(Error::schema("grid", "parent_id", "at least one domain is required"));
    }

    let mut arrays = BTreeMap::new();
    for &name in GEOGRID_ARRAY_FIELDS.iter() {
        let field = required(fields, name)?;
        if field.len() != full {
            return Err(Error::schema(
                "grid",
                name,
                format!("must be an array with {} values, got {}", full, field.len()),
            ));
        }

        let values = field
            .to_vec()
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| Error::schema("grid", name, format!("{} is not an integer", v)))
            })
            .collect::<Result<Vec<i64>>>()?;

        if name == "e_we" || name == "e_sn" {
            if let Some((i, &value)) = values
                .iter()
                .enumerate()
                .find(|&(_, &v)| v < MIN_GRID_POINTS)
            {
                return Err(Error::GeometryTooSmall {
                    domain: i + 1,
                    field: name,
                    value,
                    min: MIN_GRID_POINTS,
                });
            }
        }

        arrays.insert(name, values);
    }

    for &name in GEOGRID_SINGLE_FIELDS.iter() {
        single(fields, name)?.ok_or_else(|| Error::schema("grid", name, "missing"))?;
    }
    for &name in GRID_OPTIONAL_FIELDS.iter() {
        if !matches!(name, "geog_data_res" | "e_vert" | "parent_time_step_ratio") {
            single(fields, name)?;
        }
    }

    let projection = Projection {
        kind: match single(fields, "map_proj")? {
            Some(Value::Str(s)) => s.parse::<ProjectionKind>()?,
            _ => return Err(Error::schema("grid", "map_proj", "must be a string")),
        },
        ref_lat: number(fields, "ref_lat")?.unwrap_or_default(),
        ref_lon: number(fields, "ref_lon")?.unwrap_or_default(),
        stand_lon: number(fields, "stand_lon")?.unwrap_or_default(),
        truelat1: number(fields, "truelat1")?,
        truelat2: number(fields, "truelat2")?,
        pole_lat: number(fields, "pole_lat")?.unwrap_or(DEFAULT_POLE_LAT),
        pole_lon: number(fields, "pole_lon")?.unwrap_or(DEFAULT_POLE_LON),
        dx: number(fields, "dx")?.unwrap_or_default(),
        dy: number(fields, "dy")?.unwrap_or_default(),
    };

    let all = (1..=full).collect::<Vec<usize>>();
    let geog_data_res = match fields.get("geog_data_res") {
        Some(field) => broadcast("geog_data_res", field, full, &all, full)?
            .into_iter()
            .map(|v| match v {
                Value::Str(s) => Ok(s),
                v => Err(Error::schema(
                    "grid",
                    "geog_data_res",
                    format!("{} is not a string", v),
                )),
            })
            .collect::<Result<Vec<String>>>()?,
        None => vec![DEFAULT_GEOG_DATA_RES.to_owned(); full],
    };

    let domains = (0..full)
        .map(|i| {
            let id = i + 1;
            let parent_id = arrays["parent_id"][i];
            let parent_grid_ratio = arrays["parent_grid_ratio"][i];

            let valid_parent = if id == 1 {
                parent_id == 1
            } else {
                parent_id >= 1 && (parent_id as usize) < id
            };
            if !valid_parent {
                return Err(Error::schema(
                    "grid",
                    "parent_id",
                    format!(
                        "domain {} has parent {}, parents must be listed before their children",
                        id, parent_id
                    ),
                ));
            }
            if parent_grid_ratio < 1 {
                return Err(Error::schema(
                    "grid",
                    "parent_grid_ratio",
                    format!("domain {} has ratio {}, must be at least 1", id, parent_grid_ratio),
                ));
            }

            Ok(Domain {
                parent_id: parent_id as usize,
                parent_grid_ratio,
                i_parent_start: arrays["i_parent_start"][i],
                j_parent_start: arrays["j_parent_start"][i],
                e_we: arrays["e_we"][i],
                e_sn: arrays["e_sn"][i],
                geog_data_res: geog_data_res[i].clone(),
            })
        })
        .collect::<Result<Vec<Domain>>>()?;

    let extra = fields
        .iter()
        .filter(|(k, _)| {
            let k = k.as_str();
            !(GEOGRID_ARRAY_FIELDS.contains(&k)
                || GEOGRID_SINGLE_FIELDS.contains(&k)
                || GRID_OPTIONAL_FIELDS.contains(&k))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Grid {
        tree: DomainTree::new(domains),
        projection,
        e_vert: fields
            .get("e_vert")
            .cloned()
            .unwrap_or_else(|| Field::scalar(DEFAULT_E_VERT)),
        p_top_requested: single(fields, "p_top_requested")?
            .cloned()
            .unwrap_or(Value::Int(DEFAULT_P_TOP)),
        parent_time_step_ratio: fields.get("parent_time_step_ratio").cloned(),
        extra,
    })
}

/// Sorted selection of the `requested` domains, all domains when `None`
///
/// A selection of several domains must contain the parent of every selected nest, otherwise
/// a nest would be forced by a parent that is never simulated.
pub fn resolve_selection(tree: &DomainTree, requested: Option<&[usize]>) -> Result<DomainSelection> {
    let selection = match requested {
        Some(domains) => DomainSelection::new(domains.to_vec(), tree.len())?,
        None => return Ok(DomainSelection::all(tree.len())),
    };

    if selection.len() > 1 {
        for &domain in selection.domains().iter().filter(|&&d| d != 1) {
            let parent_id = tree.get(domain).map_or(1, |d| d.parent_id);
            if selection.position(parent_id).is_none() {
                return Err(Error::NestingViolation {
                    domain,
                    parent_id,
                    selection: selection.domains().to_vec(),
                });
            }
        }
    }

    Ok(selection)
}

fn required<'a>(fields: &'a FieldMap, name: &str) -> Result<&'a Field> {
    fields
        .get(name)
        .ok_or_else(|| Error::schema("grid", name, "missing"))
}

/// Optional field that must not be an array
fn single<'a>(fields: &'a FieldMap, name: &str) -> Result<Option<&'a Value>> {
    match fields.get(name) {
        None => Ok(None),
        Some(Field::Scalar(v)) => Ok(Some(v)),
        Some(Field::PerDomain(_)) => Err(Error::schema("grid", name, "must be a single value")),
    }
}

fn number(fields: &FieldMap, name: &str) -> Result<Option<f64>> {
    single(fields, name)?
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::schema("grid", name, format!("{} is not a number", v)))
        })
        .transpose()
}
