use log::debug;
use rand::{rngs::StdRng, Rng};

use crate::location::ConnectorKind;
use crate::region::RegionKind;
use crate::settings::{ContinentConnectionType, Properties};
use crate::shuffle::fisher_yates;
use crate::world::World;
use crate::{Attempt, Conflict};

/// One connector kind joining two regions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub kind: ConnectorKind,
    pub a: RegionKind,
    pub b: RegionKind,
}

impl Link {
    const fn new(kind: ConnectorKind, a: RegionKind, b: RegionKind) -> Self {
        Self { kind, a, b }
    }

    fn touches(&self, region: RegionKind) -> bool {
        self.a == region || self.b == region
    }

    fn same_regions(&self, other: &Link) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

/// The unmodified world's links.
pub const VANILLA_LINKS: [Link; 4] = [
    Link::new(ConnectorKind::Cave1, RegionKind::West, RegionKind::DeathMountain),
    Link::new(ConnectorKind::Cave2, RegionKind::West, RegionKind::DeathMountain),
    Link::new(ConnectorKind::Raft, RegionKind::West, RegionKind::East),
    Link::new(ConnectorKind::Bridge, RegionKind::East, RegionKind::MazeIsland),
];

fn vanilla_link(kind: ConnectorKind) -> Link {
    VANILLA_LINKS
        .iter()
        .copied()
        .find(|l| l.kind == kind)
        .unwrap_or(VANILLA_LINKS[0])
}

/// A link is pinned when either vanilla endpoint keeps a fixed layout.
fn is_pinned(props: &Properties, link: &Link) -> bool {
    props.biome(link.a).is_vanilla() || props.biome(link.b).is_vanilla()
}

/// Draws one full set of links. No connectivity check.
pub fn draw_links(props: &Properties, rng: &mut StdRng) -> Attempt<Vec<Link>> {
    match props.continent_connections {
        ContinentConnectionType::Normal | ContinentConnectionType::RbBorderShuffle => {
            Attempt::Success(VANILLA_LINKS.to_vec())
        }
        ContinentConnectionType::TransportationShuffle => {
            let free: Vec<usize> = (0..VANILLA_LINKS.len())
                .filter(|idx| !is_pinned(props, &VANILLA_LINKS[*idx]))
                .collect();
            let mut kinds: Vec<ConnectorKind> = free.iter().map(|idx| VANILLA_LINKS[*idx].kind).collect();
            fisher_yates(&mut kinds, rng);
            let mut links = VANILLA_LINKS.to_vec();
            for (idx, kind) in free.into_iter().zip(kinds) {
                links[idx].kind = kind;
            }
            Attempt::Success(links)
        }
        ContinentConnectionType::Anything => draw_any_links(props, rng),
    }
}

fn draw_any_links(props: &Properties, rng: &mut StdRng) -> Attempt<Vec<Link>> {
    let mut links: Vec<Link> = Vec::new();
    // Pinned kinds go first so the free draws can avoid their regions.
    let (pinned, free): (Vec<ConnectorKind>, Vec<ConnectorKind>) = ConnectorKind::ALL
        .into_iter()
        .partition(|kind| is_pinned(props, &vanilla_link(*kind)));
    for kind in pinned {
        links.push(vanilla_link(kind));
    }

    for kind in free {
        let mut candidates = Vec::new();
        for (i, a) in RegionKind::ALL.iter().enumerate() {
            for b in &RegionKind::ALL[i + 1..] {
                let link = Link::new(kind, *a, *b);
                let fixed_end = props.biome(*a).is_vanilla() || props.biome(*b).is_vanilla();
                if fixed_end || links.iter().any(|l| l.same_regions(&link)) {
                    continue;
                }
                candidates.push(link);
            }
        }
        if candidates.is_empty() {
            return Attempt::Conflict(Conflict::NoConnectorCandidate(kind));
        }
        links.push(candidates[rng.gen_range(0..candidates.len())]);
    }
    links.sort_by_key(|l| ConnectorKind::ALL.iter().position(|k| *k == l.kind));
    Attempt::Success(links)
}

/// Every region reachable from every other over the links.
pub fn check_connectivity(links: &[Link]) -> Attempt<()> {
    let mut parent: Vec<usize> = (0..RegionKind::ALL.len()).collect();
    fn root(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for link in links {
        let ra = root(&mut parent, link.a.index());
        let rb = root(&mut parent, link.b.index());
        parent[ra] = rb;
    }
    let home = root(&mut parent, RegionKind::West.index());
    for region in RegionKind::ALL {
        if !links.iter().any(|l| l.touches(region)) || root(&mut parent, region.index()) != home {
            return Attempt::Conflict(Conflict::Disconnected(region));
        }
    }
    Attempt::Success(())
}

/// Draws link sets until one connects the world, then wires it in. Returns
/// the number of draws used alongside the outcome.
pub fn assign_connectors(world: &mut World, props: &Properties, rng: &mut StdRng) -> (Attempt<Vec<Link>>, u32) {
    let limit = props.retry_limits.connector_attempts.max(1);
    let mut last = Conflict::Disconnected(RegionKind::West);
    for attempt in 1..=limit {
        let links = match draw_links(props, rng) {
            Attempt::Success(links) => links,
            Attempt::Conflict(conflict) => {
                last = conflict;
                continue;
            }
        };
        if let Attempt::Conflict(conflict) = check_connectivity(&links) {
            debug!("connector draw {attempt} rejected: {conflict}");
            last = conflict;
            continue;
        }
        world.connections.clear();
        for link in &links {
            if world.connect(link.kind, link.a, link.b).is_none() {
                return (Attempt::Conflict(Conflict::NoConnectorCandidate(link.kind)), attempt);
            }
        }
        return (Attempt::Success(links), attempt);
    }
    (Attempt::Conflict(last), limit)
}
