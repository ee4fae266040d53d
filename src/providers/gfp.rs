//! Global Firepower military strength index.
//!
//! Emits the full military record. NATO membership is also written to
//! `politics.is_nato`; see the sync merge rules for which provider owns
//! that field when both supply it.

use async_trait::async_trait;

use super::{Provider, select};
use crate::model::{CountryDataUpdate, Military, Politics};

pub struct GlobalFirepowerProvider;

struct MilitaryRow {
    code: &'static str,
    global_rank: i64,
    total_military_personnel: i64,
    active_soldiers: i64,
    reserve_personnel: i64,
    paramilitary_forces: i64,
    /// USD per year.
    defense_spending: f64,
    defense_spending_percent: f64,
    tanks: i64,
    armored_vehicles: i64,
    self_propelled_artillery: i64,
    towed_artillery: i64,
    rocket_projectors: i64,
    total_aircraft: i64,
    fighters: i64,
    helicopters: i64,
    attack_helicopters: i64,
    naval_vessels: i64,
    aircraft_carriers: i64,
    submarines: i64,
    destroyers: i64,
    frigates: i64,
    nuclear_weapons: bool,
    is_nato_member: bool,
}

impl MilitaryRow {
    fn to_update(&self) -> CountryDataUpdate {
        CountryDataUpdate {
            military: Some(Military {
                global_rank: Some(self.global_rank),
                total_military_personnel: Some(self.total_military_personnel),
                active_soldiers: Some(self.active_soldiers),
                reserve_personnel: Some(self.reserve_personnel),
                paramilitary_forces: Some(self.paramilitary_forces),
                defense_spending: Some(self.defense_spending),
                defense_spending_percent: Some(self.defense_spending_percent),
                tanks: Some(self.tanks),
                armored_vehicles: Some(self.armored_vehicles),
                self_propelled_artillery: Some(self.self_propelled_artillery),
                towed_artillery: Some(self.towed_artillery),
                rocket_projectors: Some(self.rocket_projectors),
                total_aircraft: Some(self.total_aircraft),
                fighters: Some(self.fighters),
                helicopters: Some(self.helicopters),
                attack_helicopters: Some(self.attack_helicopters),
                naval_vessels: Some(self.naval_vessels),
                aircraft_carriers: Some(self.aircraft_carriers),
                submarines: Some(self.submarines),
                destroyers: Some(self.destroyers),
                frigates: Some(self.frigates),
                nuclear_weapons: Some(self.nuclear_weapons),
                is_nato_member: Some(self.is_nato_member),
            }),
            politics: Some(Politics {
                is_nato: Some(self.is_nato_member),
                ..Default::default()
            }),
            ..CountryDataUpdate::new(self.code)
        }
    }
}

#[async_trait]
impl Provider for GlobalFirepowerProvider {
    fn name(&self) -> &'static str {
        "gfp"
    }

    fn source(&self) -> &'static str {
        "https://www.globalfirepower.com"
    }

    async fn fetch(&self, codes: Option<&[String]>) -> anyhow::Result<Vec<CountryDataUpdate>> {
        Ok(select(&CATALOG, codes, |row| row.code)
            .into_iter()
            .map(MilitaryRow::to_update)
            .collect())
    }
}

// 2024 ranking.
const CATALOG: [MilitaryRow; 10] = [
    MilitaryRow {
        code: "USA",
        global_rank: 1,
        total_military_personnel: 2127500,
        active_soldiers: 1328000,
        reserve_personnel: 799500,
        paramilitary_forces: 0,
        defense_spending: 886000000000.0,
        defense_spending_percent: 3.5,
        tanks: 5500,
        armored_vehicles: 45193,
        self_propelled_artillery: 1498,
        towed_artillery: 1339,
        rocket_projectors: 1366,
        total_aircraft: 13209,
        fighters: 1914,
        helicopters: 5463,
        attack_helicopters: 910,
        naval_vessels: 484,
        aircraft_carriers: 11,
        submarines: 68,
        destroyers: 92,
        frigates: 0,
        nuclear_weapons: true,
        is_nato_member: true,
    },
    MilitaryRow {
        code: "DEU",
        global_rank: 25,
        total_military_personnel: 198000,
        active_soldiers: 183500,
        reserve_personnel: 14500,
        paramilitary_forces: 0,
        defense_spending: 66000000000.0,
        defense_spending_percent: 1.5,
        tanks: 266,
        armored_vehicles: 4752,
        self_propelled_artillery: 121,
        towed_artillery: 0,
        rocket_projectors: 38,
        total_aircraft: 631,
        fighters: 133,
        helicopters: 266,
        attack_helicopters: 51,
        naval_vessels: 80,
        aircraft_carriers: 0,
        submarines: 6,
        destroyers: 0,
        frigates: 11,
        nuclear_weapons: false,
        is_nato_member: true,
    },
    MilitaryRow {
        code: "GBR",
        global_rank: 5,
        total_military_personnel: 231000,
        active_soldiers: 150000,
        reserve_personnel: 81000,
        paramilitary_forces: 0,
        defense_spending: 68000000000.0,
        defense_spending_percent: 2.2,
        tanks: 227,
        armored_vehicles: 5015,
        self_propelled_artillery: 89,
        towed_artillery: 126,
        rocket_projectors: 44,
        total_aircraft: 664,
        fighters: 137,
        helicopters: 245,
        attack_helicopters: 39,
        naval_vessels: 117,
        aircraft_carriers: 2,
        submarines: 10,
        destroyers: 6,
        frigates: 12,
        nuclear_weapons: true,
        is_nato_member: true,
    },
    MilitaryRow {
        code: "FRA",
        global_rank: 9,
        total_military_personnel: 415000,
        active_soldiers: 205000,
        reserve_personnel: 35000,
        paramilitary_forces: 175000,
        defense_spending: 55000000000.0,
        defense_spending_percent: 2.1,
        tanks: 406,
        armored_vehicles: 6330,
        self_propelled_artillery: 109,
        towed_artillery: 105,
        rocket_projectors: 13,
        total_aircraft: 965,
        fighters: 266,
        helicopters: 432,
        attack_helicopters: 69,
        naval_vessels: 180,
        aircraft_carriers: 1,
        submarines: 10,
        destroyers: 4,
        frigates: 11,
        nuclear_weapons: true,
        is_nato_member: true,
    },
    MilitaryRow {
        code: "JPN",
        global_rank: 8,
        total_military_personnel: 303000,
        active_soldiers: 247000,
        reserve_personnel: 56000,
        paramilitary_forces: 0,
        defense_spending: 54000000000.0,
        defense_spending_percent: 1.1,
        tanks: 555,
        armored_vehicles: 3160,
        self_propelled_artillery: 203,
        towed_artillery: 400,
        rocket_projectors: 99,
        total_aircraft: 1449,
        fighters: 269,
        helicopters: 508,
        attack_helicopters: 119,
        naval_vessels: 155,
        aircraft_carriers: 4,
        submarines: 23,
        destroyers: 36,
        frigates: 12,
        nuclear_weapons: false,
        is_nato_member: false,
    },
    MilitaryRow {
        code: "CHN",
        global_rank: 3,
        total_military_personnel: 3170000,
        active_soldiers: 2185000,
        reserve_personnel: 510000,
        paramilitary_forces: 475000,
        defense_spending: 296000000000.0,
        defense_spending_percent: 1.7,
        tanks: 5500,
        armored_vehicles: 35000,
        self_propelled_artillery: 4090,
        towed_artillery: 2350,
        rocket_projectors: 3180,
        total_aircraft: 3304,
        fighters: 1207,
        helicopters: 912,
        attack_helicopters: 281,
        naval_vessels: 777,
        aircraft_carriers: 3,
        submarines: 79,
        destroyers: 50,
        frigates: 50,
        nuclear_weapons: true,
        is_nato_member: false,
    },
    MilitaryRow {
        code: "IND",
        global_rank: 4,
        total_military_personnel: 5137000,
        active_soldiers: 1455550,
        reserve_personnel: 1155000,
        paramilitary_forces: 2526450,
        defense_spending: 83500000000.0,
        defense_spending_percent: 2.4,
        tanks: 4614,
        armored_vehicles: 12457,
        self_propelled_artillery: 235,
        towed_artillery: 3920,
        rocket_projectors: 374,
        total_aircraft: 2182,
        fighters: 564,
        helicopters: 810,
        attack_helicopters: 37,
        naval_vessels: 294,
        aircraft_carriers: 2,
        submarines: 18,
        destroyers: 11,
        frigates: 13,
        nuclear_weapons: true,
        is_nato_member: false,
    },
    MilitaryRow {
        code: "BRA",
        global_rank: 12,
        total_military_personnel: 2101500,
        active_soldiers: 366500,
        reserve_personnel: 1340000,
        paramilitary_forces: 395000,
        defense_spending: 22800000000.0,
        defense_spending_percent: 1.3,
        tanks: 439,
        armored_vehicles: 2280,
        self_propelled_artillery: 24,
        towed_artillery: 580,
        rocket_projectors: 70,
        total_aircraft: 679,
        fighters: 61,
        helicopters: 247,
        attack_helicopters: 12,
        naval_vessels: 112,
        aircraft_carriers: 1,
        submarines: 7,
        destroyers: 0,
        frigates: 9,
        nuclear_weapons: false,
        is_nato_member: false,
    },
    MilitaryRow {
        code: "RUS",
        global_rank: 2,
        total_military_personnel: 3570000,
        active_soldiers: 1320000,
        reserve_personnel: 2000000,
        paramilitary_forces: 250000,
        defense_spending: 109000000000.0,
        defense_spending_percent: 5.9,
        tanks: 14777,
        armored_vehicles: 60870,
        self_propelled_artillery: 6574,
        towed_artillery: 4400,
        rocket_projectors: 3065,
        total_aircraft: 4255,
        fighters: 773,
        helicopters: 1543,
        attack_helicopters: 544,
        naval_vessels: 781,
        aircraft_carriers: 1,
        submarines: 70,
        destroyers: 15,
        frigates: 11,
        nuclear_weapons: true,
        is_nato_member: false,
    },
    MilitaryRow {
        code: "AUS",
        global_rank: 16,
        total_military_personnel: 89000,
        active_soldiers: 59000,
        reserve_personnel: 30000,
        paramilitary_forces: 0,
        defense_spending: 32400000000.0,
        defense_spending_percent: 2.0,
        tanks: 59,
        armored_vehicles: 2040,
        self_propelled_artillery: 0,
        towed_artillery: 54,
        rocket_projectors: 0,
        total_aircraft: 452,
        fighters: 79,
        helicopters: 145,
        attack_helicopters: 22,
        naval_vessels: 43,
        aircraft_carriers: 2,
        submarines: 6,
        destroyers: 3,
        frigates: 8,
        nuclear_weapons: false,
        is_nato_member: false,
    },
];
