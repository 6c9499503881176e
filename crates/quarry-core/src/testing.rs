//! Scripted in-memory host for unit tests.
#![allow(
    clippy::arithmetic_side_effects,
    clippy::unwrap_used,
    clippy::struct_excessive_bools,
    missing_docs
)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use quarry_types::{
    Cluster, ColorSignature, HealthReading, Position, RotationKind, ScreenPoint, ScreenRegion,
};

use crate::config::HuntConfig;
use crate::host::{
    Clock, EntityLocator, EnvironmentValidator, Interactor, Relocator, ScreenProjector,
    SignalSource, Validation, VisualDetector,
};
use crate::signals::SignalBoard;

#[derive(Debug, Clone, Copy)]
pub struct FakeTarget {
    pub position: Position,
    pub hp: u32,
    pub corpse: bool,
    /// A fresh corpse keeps its live colouring until this time.
    pub fades_at: Option<u64>,
}

#[derive(Debug)]
pub struct FakeHost {
    pub clock: u64,
    pub me: Option<Position>,
    pub targets: Vec<FakeTarget>,
    pub agents: Vec<Position>,
    pub rival_bars: Vec<Position>,
    pub health: HealthReading,
    pub health_script: VecDeque<HealthReading>,
    pub cluster_scans: u32,
    pub interactions: u32,
    pub harvests: u32,
    pub harvest_signal: bool,
    pub menu_override: Option<Vec<String>>,
    pub vanish_after_interactions: Option<u32>,
    pub report_total_after_kill: Option<u32>,
    pub kill_signal_after_script: bool,
    pub rival_arrives_at: Option<u64>,
    pub board: SignalBoard,
    pub profile: bool,
    pub relocate_fails: bool,
    pub relocations: u32,
    pub breaks: u32,
    pub rotation: Option<RotationKind>,
    pub validation: Validation,
    pub validations: u32,
    fight: Option<Position>,
    pending_total: Option<(u64, u32)>,
    projected: RefCell<HashMap<(i32, i32), Position>>,
    bar_rgb: u32,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            clock: 0,
            me: Some(Position::new(3200, 3000, 0)),
            targets: Vec::new(),
            agents: Vec::new(),
            rival_bars: Vec::new(),
            health: HealthReading::HIDDEN,
            health_script: VecDeque::new(),
            cluster_scans: 0,
            interactions: 0,
            harvests: 0,
            harvest_signal: true,
            menu_override: None,
            vanish_after_interactions: None,
            report_total_after_kill: None,
            kill_signal_after_script: false,
            rival_arrives_at: None,
            board: SignalBoard::default(),
            profile: true,
            relocate_fails: false,
            relocations: 0,
            breaks: 0,
            rotation: None,
            validation: Validation::Ready,
            validations: 0,
            fight: None,
            pending_total: None,
            projected: RefCell::new(HashMap::new()),
            bar_rgb: HuntConfig::default().occupancy.rival.health_bar.rgb,
        }
    }

    pub fn add_target(&mut self, position: Position, hp: u32) {
        self.targets.push(FakeTarget {
            position,
            hp,
            corpse: false,
            fades_at: None,
        });
    }

    /// A corpse that has already lost its live colouring.
    pub fn add_corpse(&mut self, position: Position) {
        self.targets.push(FakeTarget {
            position,
            hp: 0,
            corpse: true,
            fades_at: None,
        });
    }

    /// Script the indicator readings of a fight; the target dies when the
    /// script runs out.
    pub fn script_fight(&mut self, position: Position, hitpoints: &[u32]) {
        self.fight = Some(position);
        self.health_script = hitpoints.iter().map(|hp| HealthReading::showing(*hp)).collect();
    }

    fn die(&mut self, position: Position) {
        let now = self.clock;
        for target in self.targets.iter_mut().filter(|t| t.position == position) {
            target.corpse = true;
            target.hp = 0;
            target.fades_at = Some(now + 1_000);
        }
        self.health = HealthReading::HIDDEN;
        if let Some(total) = self.report_total_after_kill {
            self.pending_total = Some((now + 200, total));
        }
        if self.kill_signal_after_script {
            self.board.kill_observed = true;
        }
    }

    fn base_point(&self, position: Position) -> Option<(i32, i32)> {
        let me = self.me?;
        if !me.same_layer(&position) || me.tile_distance(&position) > 20 {
            return None;
        }
        let dx = i32::from(position.x) - i32::from(me.x);
        let dy = i32::from(position.y) - i32::from(me.y);
        Some((400 + dx * 20, 300 + dy * 20))
    }

    fn menu_at(&self, region: ScreenRegion) -> Vec<String> {
        if let Some(menu) = &self.menu_override {
            return menu.clone();
        }
        let center = region.center();
        let position = self.projected.borrow().get(&(center.x, center.y)).copied();
        let target = position.and_then(|p| self.targets.iter().find(|t| t.position == p));
        let mut menu = Vec::new();
        match target {
            Some(t) if t.corpse => menu.push("Pluck Chompy bird".to_owned()),
            Some(_) => menu.push("Attack Chompy bird".to_owned()),
            None => {}
        }
        menu.push("Walk here".to_owned());
        menu
    }

    fn apply_scheduled(&mut self) {
        if let Some(at) = self.rival_arrives_at
            && self.clock >= at
        {
            self.rival_arrives_at = None;
            self.agents.push(Position::new(3205, 3000, 0));
        }
        if let Some((at, total)) = self.pending_total
            && self.clock >= at
        {
            self.pending_total = None;
            self.board.record_total(total);
        }
    }
}

impl Clock for FakeHost {
    fn now_ms(&self) -> u64 {
        self.clock
    }

    fn sleep(&mut self, ms: u64) {
        self.clock += ms;
        self.apply_scheduled();
    }
}

impl VisualDetector for FakeHost {
    fn find_clusters(&mut self, signature: &ColorSignature) -> Vec<Cluster> {
        self.cluster_scans += 1;
        if signature.rgb == self.bar_rgb {
            return self
                .rival_bars
                .iter()
                .filter_map(|p| self.base_point(*p))
                .map(|(sx, sy)| Cluster::new(ScreenRegion::new(sx - 15, sy - 78, 30, 6), 40))
                .collect();
        }
        let now = self.clock;
        self.targets
            .iter()
            .filter(|t| !t.corpse || t.fades_at.is_some_and(|at| at > now))
            .filter_map(|t| self.project(t.position, 70))
            .map(|region| {
                let c = region.center();
                Cluster::new(ScreenRegion::new(c.x - 10, c.y - 10, 20, 20), 50)
            })
            .collect()
    }

    fn health_indicator(&mut self) -> HealthReading {
        let Some(reading) = self.health_script.pop_front() else {
            return self.health;
        };
        if self.health_script.is_empty()
            && let Some(position) = self.fight.take()
        {
            self.die(position);
        }
        reading
    }
}

impl EntityLocator for FakeHost {
    fn entity_positions(&self) -> Vec<Position> {
        self.targets.iter().map(|t| t.position).collect()
    }

    fn agent_positions(&self) -> Vec<Position> {
        self.agents.clone()
    }

    fn self_position(&self) -> Option<Position> {
        self.me
    }
}

impl ScreenProjector for FakeHost {
    fn project(&self, position: Position, height_hint: i32) -> Option<ScreenRegion> {
        let (sx, sy) = self.base_point(position)?;
        let region = ScreenRegion::new(sx - 15, sy - height_hint, 30, height_hint);
        let ScreenPoint { x, y } = region.center();
        self.projected.borrow_mut().insert((x, y), position);
        Some(region)
    }
}

impl Interactor for FakeHost {
    fn interact(
        &mut self,
        region: ScreenRegion,
        chooser: &mut dyn FnMut(&[String]) -> Option<usize>,
    ) -> bool {
        self.interactions += 1;
        let menu = self.menu_at(region);
        let picked = chooser(&menu).and_then(|i| menu.get(i).cloned());

        if self
            .vanish_after_interactions
            .is_some_and(|n| self.interactions >= n)
        {
            self.targets.clear();
        }

        let Some(entry) = picked else {
            return false;
        };
        if entry.starts_with("Pluck") && self.harvest_signal {
            let center = region.center();
            let position = self.projected.borrow().get(&(center.x, center.y)).copied();
            self.targets.retain(|t| Some(t.position) != position);
            self.board.harvest_started = true;
            self.harvests += 1;
        }
        true
    }
}

impl SignalSource for FakeHost {
    fn signals(&mut self) -> &mut SignalBoard {
        &mut self.board
    }
}

impl Relocator for FakeHost {
    fn has_relocation_profile(&self) -> bool {
        self.profile
    }

    fn relocate(&mut self) -> bool {
        if self.relocate_fails {
            return false;
        }
        self.relocations += 1;
        self.agents.clear();
        self.rival_bars.clear();
        self.rotation = None;
        true
    }

    fn take_break(&mut self) -> bool {
        self.breaks += 1;
        self.rotation = None;
        true
    }

    fn rotation_due(&mut self) -> Option<RotationKind> {
        self.rotation
    }
}

impl EnvironmentValidator for FakeHost {
    fn validate_environment(&mut self) -> Validation {
        self.validations += 1;
        self.validation.clone()
    }
}
