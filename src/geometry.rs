//! Nested domain geometry and its subsetting onto a domain selection.
//!
//! The grid preprocessor derives every nest's position from the root domain's reference point,
//! spacing and the chain of nesting ratios. It cannot be told to start at an interior domain, so
//! when a run is rooted at domain `k > 1` the geometry is rewritten here so that domain `k`
//! becomes the root: its spacing is refined through its ancestors and the reference point is
//! moved to its centre.

use {
    crate::{
        broadcast::DomainSelection,
        error::{Error, Result},
        parameters::FieldMap,
        projection::{normalise_lon, Projection, Transform},
        value::{Field, Value},
    },
    log::{debug, info},
};

/// One nested grid
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// 1 for the root domain
    pub parent_id: usize,
    pub parent_grid_ratio: i64,
    /// Offset (1-based) of the domain's lower-left corner in the parent grid
    pub i_parent_start: i64,
    pub j_parent_start: i64,
    /// Grid points in the west-east and south-north directions
    pub e_we: i64,
    pub e_sn: i64,
    /// Static data resolution tag
    pub geog_data_res: String,
}

/// Domains indexed from 1, domain 1 being the root
#[derive(Debug, Clone, PartialEq)]
pub struct DomainTree {
    domains: Vec<Domain>,
}

impl DomainTree {
    pub fn new(domains: Vec<Domain>) -> Self {
        Self { domains }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domain `id` (1-based)
    pub fn get(&self, id: usize) -> Option<&Domain> {
        id.checked_sub(1).and_then(|i| self.domains.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    /// Ancestors of `id` below the root, outermost first, ending with `id` itself
    ///
    /// Empty for the root domain.
    pub fn lineage(&self, id: usize) -> Vec<usize> {
        let mut lineage = vec![];
        let mut current = id;

        while current > 1 {
            lineage.push(current);
            current = match self.get(current) {
                Some(d) => d.parent_id,
                None => break,
            };
        }

        lineage.reverse();
        lineage
    }

    pub fn parent_ids(&self) -> Vec<usize> {
        self.domains.iter().map(|d| d.parent_id).collect()
    }

    pub fn parent_grid_ratios(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.parent_grid_ratio).collect()
    }

    pub fn i_parent_starts(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.i_parent_start).collect()
    }

    pub fn j_parent_starts(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.j_parent_start).collect()
    }

    pub fn e_we(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.e_we).collect()
    }

    pub fn e_sn(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.e_sn).collect()
    }

    pub fn geog_data_res(&self) -> Vec<String> {
        self.domains
            .iter()
            .map(|d| d.geog_data_res.clone())
            .collect()
    }
}

/// Domain geometry, projection and the remaining grid settings read from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub tree: DomainTree,
    pub projection: Projection,
    /// Vertical levels, scalar or per-domain
    pub e_vert: Field,
    pub p_top_requested: Value,
    /// Explicit time step ratios, otherwise derived from the nesting ratios
    pub parent_time_step_ratio: Option<Field>,
    /// Fields passed through to the model's `&domains`
    pub extra: FieldMap,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Subsets `tree` onto `selection`, re-rooting the projection at the selection's top domain
///
/// When the top domain is domain 1 the projection is returned untouched.
pub fn reproject(
    tree: &DomainTree,
    projection: &Projection,
    selection: &DomainSelection,
) -> Result<(DomainTree, Projection)> {
    if let Some(&d) = selection.domains().iter().find(|&&d| tree.get(d).is_none()) {
        return Err(Error::InvalidDomainSelection {
            selection: selection.domains().to_vec(),
            reason: format!(
                "domain {} is greater than the {} configured domains",
                d,
                tree.len()
            ),
        });
    }

    let projection = if selection.is_rerooted() {
        recentre(tree, projection, selection.top())?
    } else {
        projection.clone()
    };

    let domains = selection
        .domains()
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let mut domain = tree.domains[d - 1].clone();
            if i == 0 {
                domain.parent_id = 1;
                domain.parent_grid_ratio = 1;
                domain.i_parent_start = 1;
                domain.j_parent_start = 1;
            } else {
                domain.parent_id = selection.position(domain.parent_id).unwrap_or(1);
            }
            domain
        })
        .collect();

    Ok((DomainTree::new(domains), projection))
}

/// Projection whose root domain is domain `top` of `tree`
fn recentre(tree: &DomainTree, projection: &Projection, top: usize) -> Result<Projection> {
    let transform = Transform::new(projection)?;
    let root = &tree.domains[0];

    let (mut dx, mut dy) = (projection.dx, projection.dy);

    // Centre of each domain in projected coordinates, walking down from the root
    let (mut x, mut y) = transform.forward(projection.ref_lat, projection.ref_lon);
    let mut half_x = 0.5 * (root.e_we - 1) as f64 * dx;
    let mut half_y = 0.5 * (root.e_sn - 1) as f64 * dy;

    for id in tree.lineage(top) {
        let domain = &tree.domains[id - 1];

        let start_x = (domain.i_parent_start - 1) as f64 * dx;
        let start_y = (domain.j_parent_start - 1) as f64 * dy;

        dx /= domain.parent_grid_ratio as f64;
        dy /= domain.parent_grid_ratio as f64;

        x += start_x + 0.5 * (domain.e_we - 1) as f64 * dx - half_x;
        y += start_y + 0.5 * (domain.e_sn - 1) as f64 * dy - half_y;

        half_x = 0.5 * (domain.e_we - 1) as f64 * dx;
        half_y = 0.5 * (domain.e_sn - 1) as f64 * dy;

        debug!("domain {} centre at ({:.1}, {:.1}), dx = {}", id, x, y, dx);
    }

    let (lat, lon) = transform.inverse(x, y);
    let ref_lat = round6(lat);
    let ref_lon = round6(lon);
    let stand_lon = round6(normalise_lon(lon + projection.stand_lon - projection.ref_lon));

    info!(
        "Re-rooted at domain {}: ref_lat = {}, ref_lon = {}, stand_lon = {}, dx = {}, dy = {}",
        top, ref_lat, ref_lon, stand_lon, dx, dy
    );

    Ok(Projection {
        ref_lat,
        ref_lon,
        stand_lon,
        truelat1: Some(ref_lat),
        truelat2: Some(ref_lat),
        dx,
        dy,
        ..projection.clone()
    })
}

fn round6(x: f64) -> f64 {
    (x * 1.0e6).round() / 1.0e6
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::projection::ProjectionKind,
        approx::assert_abs_diff_eq,
    };

    fn domain(parent_id: usize, ratio: i64, i: i64, j: i64, e: i64) -> Domain {
        Domain {
            parent_id,
            parent_grid_ratio: ratio,
            i_parent_start: i,
            j_parent_start: j,
            e_we: e,
            e_sn: e,
            geog_data_res: "default".to_owned(),
        }
    }

    fn tree() -> DomainTree {
        DomainTree::new(vec![
            domain(1, 1, 1, 1, 100),
            domain(1, 3, 30, 20, 130),
            domain(2, 3, 10, 10, 160),
        ])
    }

    fn lambert() -> Projection {
        Projection {
            kind: ProjectionKind::Lambert,
            ref_lat: -40.0,
            ref_lon: 170.0,
            stand_lon: 170.0,
            truelat1: Some(-40.0),
            truelat2: Some(-40.0),
            pole_lat: 90.0,
            pole_lon: 0.0,
            dx: 27000.0,
            dy: 27000.0,
        }
    }

    #[test]
    fn lineage() {
        let tree = tree();
        assert_eq!(tree.lineage(1), Vec::<usize>::new());
        assert_eq!(tree.lineage(2), vec![2]);
        assert_eq!(tree.lineage(3), vec![2, 3]);
    }

    #[test]
    fn selection_only_leaves_projection_untouched() {
        let projection = lambert();
        for domains in &[vec![1, 2, 3], vec![1, 2], vec![1]] {
            let selection = DomainSelection::new(domains.clone(), 3).unwrap();
            let (sub, p) = reproject(&tree(), &projection, &selection).unwrap();

            assert_eq!(p, projection);
            assert_eq!(p.dx.to_bits(), projection.dx.to_bits());
            assert_eq!(p.ref_lat.to_bits(), projection.ref_lat.to_bits());
            assert_eq!(sub.len(), domains.len());
        }
    }

    #[test]
    fn subset_is_reindexed() {
        let selection = DomainSelection::new(vec![1, 2], 3).unwrap();
        let (sub, _) = reproject(&tree(), &lambert(), &selection).unwrap();

        assert_eq!(sub.parent_ids(), vec![1, 1]);
        assert_eq!(sub.parent_grid_ratios(), vec![1, 3]);
        assert_eq!(sub.e_we(), vec![100, 130]);
    }

    #[test]
    fn rerooted_at_domain_2() {
        let projection = lambert();
        let selection = DomainSelection::new(vec![2, 3], 3).unwrap();
        let (sub, p) = reproject(&tree(), &projection, &selection).unwrap();

        assert_eq!(sub.parent_ids(), vec![1, 1]);
        assert_eq!(sub.parent_grid_ratios(), vec![1, 3]);
        assert_eq!(sub.i_parent_starts(), vec![1, 10]);
        assert_eq!(sub.j_parent_starts(), vec![1, 10]);
        assert_eq!(sub.e_we(), vec![130, 160]);

        assert_abs_diff_eq!(p.dx, 9000.0);
        assert_abs_diff_eq!(p.dy, 9000.0);
        assert_abs_diff_eq!(p.stand_lon, p.ref_lon, epsilon = 1.0e-6);
        assert_eq!(p.truelat1, Some(p.ref_lat));

        // The new centre sits where the preprocessor would have placed domain 2:
        // x offset = 29 * 27000 + 64.5 * 9000 - 49.5 * 27000 = 27000
        // y offset = 19 * 27000 + 64.5 * 9000 - 49.5 * 27000 = -243000
        let t = Transform::new(&projection).unwrap();
        let (x0, y0) = t.forward(projection.ref_lat, projection.ref_lon);
        let (x, y) = t.forward(p.ref_lat, p.ref_lon);
        assert_abs_diff_eq!(x - x0, 27000.0, epsilon = 0.5);
        assert_abs_diff_eq!(y - y0, -243000.0, epsilon = 0.5);
    }

    #[test]
    fn rerooted_at_domain_3() {
        let projection = lambert();
        let selection = DomainSelection::new(vec![3], 3).unwrap();
        let (sub, p) = reproject(&tree(), &projection, &selection).unwrap();

        assert_eq!(sub.parent_ids(), vec![1]);
        assert_eq!(sub.e_we(), vec![160]);
        assert_abs_diff_eq!(p.dx, 3000.0);

        // domain 2 centre offset (27000, -243000) then
        // 9 * 9000 + 79.5 * 3000 - 64.5 * 9000 = -261000 in both directions
        let t = Transform::new(&projection).unwrap();
        let (x0, y0) = t.forward(projection.ref_lat, projection.ref_lon);
        let (x, y) = t.forward(p.ref_lat, p.ref_lon);
        assert_abs_diff_eq!(x - x0, 27000.0 - 261000.0, epsilon = 0.5);
        assert_abs_diff_eq!(y - y0, -243000.0 - 261000.0, epsilon = 0.5);
    }

    /// Projected offset of the re-rooted reference point from the configured one
    fn centre_offset(projection: &Projection, domains: Vec<usize>) -> (Projection, f64, f64) {
        let selection = DomainSelection::new(domains, 3).unwrap();
        let (_, p) = reproject(&tree(), projection, &selection).unwrap();

        let t = Transform::new(projection).unwrap();
        let (x0, y0) = t.forward(projection.ref_lat, projection.ref_lon);
        let (x, y) = t.forward(p.ref_lat, p.ref_lon);
        (p, x - x0, y - y0)
    }

    #[test]
    fn rerooted_mercator() {
        let projection = Projection {
            kind: ProjectionKind::Mercator,
            ref_lat: 10.0,
            ref_lon: 100.0,
            stand_lon: 100.0,
            truelat1: Some(10.0),
            truelat2: None,
            ..lambert()
        };

        let (p, x, y) = centre_offset(&projection, vec![2, 3]);
        assert_abs_diff_eq!(x, 27000.0, epsilon = 0.5);
        assert_abs_diff_eq!(y, -243000.0, epsilon = 0.5);
        assert_abs_diff_eq!(p.dx, 9000.0);
        assert_abs_diff_eq!(p.stand_lon, p.ref_lon, epsilon = 1.0e-6);
        assert!(p.ref_lat < projection.ref_lat);

        let (p, x, y) = centre_offset(&projection, vec![3]);
        assert_abs_diff_eq!(x, -234000.0, epsilon = 0.5);
        assert_abs_diff_eq!(y, -504000.0, epsilon = 0.5);
        assert_abs_diff_eq!(p.dx, 3000.0);
    }

    #[test]
    fn rerooted_polar() {
        let north = Projection {
            kind: ProjectionKind::Polar,
            ref_lat: 70.0,
            ref_lon: -40.0,
            stand_lon: -45.0,
            truelat1: Some(60.0),
            truelat2: None,
            ..lambert()
        };
        let south = Projection {
            kind: ProjectionKind::Polar,
            ref_lat: -75.0,
            ref_lon: 160.0,
            stand_lon: 160.0,
            truelat1: Some(-71.0),
            truelat2: None,
            ..lambert()
        };

        for projection in &[north, south] {
            let (p, x, y) = centre_offset(projection, vec![2, 3]);
            assert_abs_diff_eq!(x, 27000.0, epsilon = 0.5);
            assert_abs_diff_eq!(y, -243000.0, epsilon = 0.5);
            assert_abs_diff_eq!(
                p.stand_lon - p.ref_lon,
                projection.stand_lon - projection.ref_lon,
                epsilon = 2.0e-6
            );

            let (p, x, y) = centre_offset(projection, vec![3]);
            assert_abs_diff_eq!(x, -234000.0, epsilon = 0.5);
            assert_abs_diff_eq!(y, -504000.0, epsilon = 0.5);
            assert_abs_diff_eq!(p.dy, 3000.0);
        }
    }

    #[test]
    fn stand_lon_offset_carried_forward() {
        let mut projection = lambert();
        projection.stand_lon = 172.5;
        let selection = DomainSelection::new(vec![2], 3).unwrap();
        let (_, p) = reproject(&tree(), &projection, &selection).unwrap();

        assert_abs_diff_eq!(p.stand_lon - p.ref_lon, 2.5, epsilon = 2.0e-6);
    }

    #[test]
    fn rerooting_lat_lon_is_unsupported() {
        let mut projection = lambert();
        projection.kind = ProjectionKind::LatLon;

        let all = DomainSelection::all(3);
        assert!(reproject(&tree(), &projection, &all).is_ok());

        let selection = DomainSelection::new(vec![2, 3], 3).unwrap();
        assert!(matches!(
            reproject(&tree(), &projection, &selection),
            Err(Error::UnsupportedProjection { .. })
        ));
    }

    #[test]
    fn top_beyond_tree_is_invalid() {
        let selection = DomainSelection::new(vec![4], 4).unwrap();
        assert!(matches!(
            reproject(&tree(), &lambert(), &selection),
            Err(Error::InvalidDomainSelection { .. })
        ));
    }
}
