//! Energy measurement around a single database call.
//!
//! [`RaplMeter`] reads the Linux powercap counters of the top-level
//! `intel-rapl:N` zones and converts the consumed energy to kg CO2e with a
//! fixed carbon intensity.

use anyhow::Context;
use std::path::{Path, PathBuf};

const UJ_PER_KWH: f64 = 3.6e12;

pub trait EnergyMeter: Send + Sync {
    fn start(&self) -> anyhow::Result<Box<dyn EnergySession>>;
}

pub trait EnergySession: Send {
    /// Emissions in kg CO2e since the session started.
    fn stop(self: Box<Self>) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone)]
struct Zone {
    energy_path: PathBuf,
    max_range_uj: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RaplMeter {
    zones: Vec<Zone>,
    carbon_intensity_g_per_kwh: f64,
}

impl RaplMeter {
    pub fn discover(root: &Path, carbon_intensity_g_per_kwh: f64) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("failed to list powercap root {}", root.display()))?;

        let mut zones = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_top_level_zone(&name) {
                continue;
            }
            let dir = entry.path();
            let energy_path = dir.join("energy_uj");
            if !energy_path.exists() {
                continue;
            }
            let max_range_uj = read_counter(&dir.join("max_energy_range_uj")).ok();
            zones.push(Zone {
                energy_path,
                max_range_uj,
            });
        }
        zones.sort_by(|a, b| a.energy_path.cmp(&b.energy_path));

        if zones.is_empty() {
            anyhow::bail!("no intel-rapl zones under {}", root.display());
        }
        // Counters are often readable by root only.
        for z in &zones {
            read_counter(&z.energy_path)?;
        }

        tracing::info!(
            event = "energy.ready",
            root = %root.display(),
            zones = zones.len(),
            carbon_intensity_g_per_kwh,
        );
        Ok(Self {
            zones,
            carbon_intensity_g_per_kwh,
        })
    }

    fn read_all(&self) -> anyhow::Result<Vec<u64>> {
        self.zones.iter().map(|z| read_counter(&z.energy_path)).collect()
    }
}

fn is_top_level_zone(name: &str) -> bool {
    name.strip_prefix("intel-rapl:")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn read_counter(path: &Path) -> anyhow::Result<u64> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("invalid counter in {}: {:?}", path.display(), raw.trim()))
}

fn delta_uj(before: u64, after: u64, max_range_uj: Option<u64>) -> u64 {
    if after >= before {
        after - before
    } else {
        match max_range_uj {
            Some(max) => max.saturating_sub(before) + after,
            None => 0,
        }
    }
}

pub fn uj_to_kg_co2e(uj: f64, carbon_intensity_g_per_kwh: f64) -> f64 {
    uj / UJ_PER_KWH * carbon_intensity_g_per_kwh / 1000.0
}

struct RaplSession {
    meter: RaplMeter,
    start: Vec<u64>,
}

impl EnergyMeter for RaplMeter {
    fn start(&self) -> anyhow::Result<Box<dyn EnergySession>> {
        Ok(Box::new(RaplSession {
            meter: self.clone(),
            start: self.read_all()?,
        }))
    }
}

impl EnergySession for RaplSession {
    fn stop(self: Box<Self>) -> anyhow::Result<f64> {
        let end = self.meter.read_all()?;
        let total: u64 = self
            .meter
            .zones
            .iter()
            .zip(self.start.iter().zip(end.iter()))
            .map(|(z, (b, a))| delta_uj(*b, *a, z.max_range_uj))
            .sum();
        Ok(uj_to_kg_co2e(
            total as f64,
            self.meter.carbon_intensity_g_per_kwh,
        ))
    }
}

/// Reports the same emission value for every measurement. Useful for dry
/// runs and tests where no counters are available.
#[derive(Debug, Clone, Copy)]
pub struct FixedMeter(pub f64);

struct FixedSession(f64);

impl EnergyMeter for FixedMeter {
    fn start(&self) -> anyhow::Result<Box<dyn EnergySession>> {
        Ok(Box::new(FixedSession(self.0)))
    }
}

impl EnergySession for FixedSession {
    fn stop(self: Box<Self>) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}
