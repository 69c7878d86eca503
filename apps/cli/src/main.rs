#![deny(warnings)]

//! Command-line armor damage simulator.
//!
//! Reads hit events one per line (or from `--events`) and prints each shot's
//! outcome until the target dies. `--sample` runs seeded time-to-kill trials,
//! `--ttk` prints unarmored shots-to-kill per location and `--kill-threshold`
//! the helmet durability that survives one or two headshots.

use anyhow::{anyhow, bail, Context, Result};
use armor_catalog::Catalog;
use armor_core::{Combatant, DamageProfile, HitEvent, Precision};
use armor_sim::{
    CombatSim, CombatSummary, HitDistribution, KillThreshold, ShotReport, SimState, TtkRow,
};
use rust_decimal::Decimal;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: armor-cli [options]
  --catalog DIR              catalog directory (default assets/catalog)
  --weapon ID --ammo ID      firearm or bow with its ammunition
  --melee ID                 melee weapon combo instead of --weapon/--ammo
  --helmet ID [--helmet-durability N]
  --armor ID [--armor-durability N]
  --distance M               engagement distance in meters, 0..400 (default 10)
  --events a,b,c             batch events instead of reading stdin
  --sample N [--seed S]      N seeded trials drawn from --events (weight = count)
  --max-shots N              shot cap for --sample (default 100)
  --ttk                      unarmored shots and time to kill per location
  --kill-threshold           helmet durability surviving 1-2 headshots
                             (every compatible ammo unless --ammo is given)
  --json                     JSON output
  --list                     print the catalog and exit
  --debug                    debug logging unless RUST_LOG is set
  --version";

/// Sampling distribution used when `--sample` is given without `--events`.
const DEFAULT_SAMPLE_EVENTS: &str = "head,chest,chest,abdomen,upper-arm,thigh,miss";

#[derive(Debug, Clone, PartialEq)]
struct CliConfig {
    catalog: PathBuf,
    weapon: Option<String>,
    ammo: Option<String>,
    melee: Option<String>,
    helmet: Option<String>,
    helmet_durability: Option<Decimal>,
    armor: Option<String>,
    armor_durability: Option<Decimal>,
    distance: Decimal,
    events: Option<Vec<String>>,
    sample: Option<u32>,
    seed: u64,
    max_shots: u32,
    ttk: bool,
    kill_threshold: bool,
    json: bool,
    list: bool,
    debug: bool,
    version: bool,
    help: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("assets/catalog"),
            weapon: None,
            ammo: None,
            melee: None,
            helmet: None,
            helmet_durability: None,
            armor: None,
            armor_durability: None,
            distance: Decimal::new(10, 0),
            events: None,
            sample: None,
            seed: 42,
            max_shots: 100,
            ttk: false,
            kill_threshold: false,
            json: false,
            list: false,
            debug: false,
            version: false,
            help: false,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliConfig> {
    let mut cfg = CliConfig::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--catalog" => cfg.catalog = PathBuf::from(value()?),
            "--weapon" => cfg.weapon = Some(value()?),
            "--ammo" => cfg.ammo = Some(value()?),
            "--melee" => cfg.melee = Some(value()?),
            "--helmet" => cfg.helmet = Some(value()?),
            "--helmet-durability" => cfg.helmet_durability = Some(number(&arg, &value()?)?),
            "--armor" => cfg.armor = Some(value()?),
            "--armor-durability" => cfg.armor_durability = Some(number(&arg, &value()?)?),
            "--distance" => cfg.distance = number(&arg, &value()?)?,
            "--events" => {
                cfg.events = Some(value()?.split(',').map(|s| s.trim().to_string()).collect())
            }
            "--sample" => cfg.sample = Some(number(&arg, &value()?)?),
            "--seed" => cfg.seed = number(&arg, &value()?)?,
            "--max-shots" => cfg.max_shots = number(&arg, &value()?)?,
            "--ttk" => cfg.ttk = true,
            "--kill-threshold" => cfg.kill_threshold = true,
            "--json" => cfg.json = true,
            "--list" => cfg.list = true,
            "--debug" => cfg.debug = true,
            "--version" | "-V" => cfg.version = true,
            "--help" | "-h" => cfg.help = true,
            other => bail!("unknown argument: {other}\n{USAGE}"),
        }
    }
    Ok(cfg)
}

fn number<T: std::str::FromStr>(flag: &str, text: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse()
        .map_err(|e| anyhow!("{flag}: invalid number {text:?}: {e}"))
}

fn parse_events(items: &[String]) -> Result<Vec<HitEvent>> {
    items
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HitEvent>().map_err(anyhow::Error::from))
        .collect()
}

fn load_profiles(cfg: &CliConfig, catalog: &Catalog) -> Result<Vec<DamageProfile>> {
    if let Some(melee) = &cfg.melee {
        return Ok(catalog.combo(melee)?);
    }
    let weapon = cfg
        .weapon
        .as_deref()
        .ok_or_else(|| anyhow!("--weapon (or --melee) is required\n{USAGE}"))?;
    let ammo = match cfg.ammo.as_deref() {
        Some(a) => a.to_string(),
        None => {
            let fits = catalog.ammo_for(weapon)?;
            match fits.as_slice() {
                [only] => only.id.clone(),
                _ => bail!("--ammo is required for {weapon}"),
            }
        }
    };
    Ok(vec![catalog.profile(weapon, &ammo)?])
}

fn load_target(cfg: &CliConfig, catalog: &Catalog) -> Result<Combatant> {
    let helmet = cfg
        .helmet
        .as_deref()
        .map(|id| catalog.helmet(id, cfg.helmet_durability))
        .transpose()?;
    let armor = cfg
        .armor
        .as_deref()
        .map(|id| catalog.armor(id, cfg.armor_durability))
        .transpose()?;
    Ok(Combatant::new(helmet, armor)?)
}

fn print_catalog(catalog: &Catalog) {
    println!("weapons:");
    for w in catalog.weapons() {
        println!("  {:<28} {} [{}]", w.id, w.name, w.caliber);
    }
    println!("ammo:");
    for a in catalog.ammo_list() {
        println!(
            "  {:<28} {} [{}] pen {}",
            a.id, a.name, a.caliber, a.penetration_level
        );
    }
    println!("helmets:");
    for h in catalog.helmets() {
        println!(
            "  {:<28} {} lvl {} dur {}",
            h.id, h.name, h.protection_level, h.max_durability
        );
    }
    println!("body armor:");
    for b in catalog.body_armor() {
        println!(
            "  {:<28} {} {:?} lvl {} dur {}",
            b.id, b.name, b.class, b.protection_level, b.max_durability
        );
    }
    println!("melee:");
    for m in catalog.melee_weapons() {
        println!("  {:<28} {} ({} strikes)", m.id, m.name, m.strikes.len());
    }
}

fn render_shot(shot: u32, report: &ShotReport) -> String {
    let o = &report.outcome;
    let mut line = format!("#{shot} {}", o.event);
    if o.is_miss {
        line.push_str(" | miss");
    } else {
        line.push_str(&format!(" | damage {}", o.damage_to_health));
        match (o.slot, o.remaining_durability) {
            (Some(slot), Some(left)) if o.bypassed => {
                line.push_str(&format!(" | {slot} bypassed ({left} left)"))
            }
            (Some(slot), Some(left)) => {
                line.push_str(&format!(" | {slot} -{} ({left} left)", o.durability_consumed));
                if let Some(ratio) = o.absorbed_ratio {
                    line.push_str(&format!(" breakthrough {ratio}"));
                }
                if o.item_destroyed {
                    line.push_str(" destroyed");
                }
            }
            _ => line.push_str(" | unprotected"),
        }
    }
    line.push_str(&format!(
        " | health {} | t {} ms",
        Precision::Damage.apply(report.health),
        o.elapsed_time_ms
    ));
    line
}

fn render_summary(s: &CombatSummary) -> String {
    let mut out = format!(
        "{} after {} shots ({} hits, {} misses) in {} ms\n  total damage {} | armor damage {} | health {}",
        if s.killed { "killed" } else { "alive" },
        s.shots,
        s.hits,
        s.misses,
        s.elapsed_ms,
        s.total_damage,
        s.total_armor_damage,
        s.health
    );
    if let Some(h) = s.helmet_durability {
        out.push_str(&format!(" | helmet {h}"));
    }
    if let Some(a) = s.armor_durability {
        out.push_str(&format!(" | armor {a}"));
    }
    for (location, hits) in &s.location_hits {
        out.push_str(&format!("\n  {location}: {hits}"));
    }
    out
}

fn render_ttk(name: &str, rows: &[TtkRow]) -> String {
    let mut out = format!("{name}: unarmored time to kill");
    for row in rows {
        out.push_str(&format!("\n  {:<12} damage {:>7}", row.location.to_string(), row.damage_per_shot));
        match (row.shots_to_kill, row.time_to_kill_ms) {
            (Some(shots), Some(ms)) => out.push_str(&format!(" | {shots} shots | {ms} ms")),
            _ => out.push_str(" | cannot kill"),
        }
    }
    out
}

fn render_threshold(name: &str, threshold: &KillThreshold) -> String {
    let verdict = match threshold {
        KillThreshold::AlwaysKills { shots: 1 } => "one headshot always kills".to_string(),
        KillThreshold::AlwaysKills { shots } => format!("{shots} headshots always kill"),
        KillThreshold::SurvivesFrom { shots, durability } => {
            format!("survives {shots} headshot(s) from helmet durability {durability}")
        }
        KillThreshold::CannotKill => "two headshots cannot kill".to_string(),
    };
    format!("{name}: {verdict}")
}

fn run_kill_threshold(cfg: &CliConfig, catalog: &Catalog) -> Result<()> {
    let weapon = cfg
        .weapon
        .as_deref()
        .ok_or_else(|| anyhow!("--kill-threshold needs --weapon\n{USAGE}"))?;
    let ammo: Vec<String> = match cfg.ammo.as_deref() {
        Some(a) => vec![a.to_string()],
        None => catalog.ammo_for(weapon)?.iter().map(|a| a.id.clone()).collect(),
    };
    for id in &ammo {
        let profile = catalog.profile(weapon, id)?;
        let threshold = armor_sim::min_surviving_durability(&profile, cfg.distance)?;
        if cfg.json {
            let row = serde_json::json!({ "profile": profile.name, "threshold": threshold });
            println!("{}", serde_json::to_string(&row)?);
        } else {
            println!("{}", render_threshold(&profile.name, &threshold));
        }
    }
    Ok(())
}

fn run_ttk(profiles: &[DamageProfile], distance: Decimal, json: bool) -> Result<()> {
    for profile in profiles {
        let rows = armor_sim::ttk_table(profile, distance)?;
        if json {
            let table = serde_json::json!({ "profile": profile.name, "rows": rows });
            println!("{}", serde_json::to_string_pretty(&table)?);
        } else {
            println!("{}", render_ttk(&profile.name, &rows));
        }
    }
    Ok(())
}

fn print_summary(summary: &CombatSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", render_summary(summary));
    }
    Ok(())
}

/// Fire one event; returns true once the target is dead.
fn fire(
    sim: &mut CombatSim,
    profiles: &[DamageProfile],
    event: HitEvent,
    json: bool,
) -> Result<bool> {
    let step = sim.shots() as usize % profiles.len().max(1);
    let profile = profiles
        .get(step)
        .ok_or_else(|| anyhow!("no damage profile loaded"))?;
    let report = sim.fire(profile, event)?;
    if json {
        println!("{}", serde_json::to_string(&report.outcome)?);
    } else {
        println!("{}", render_shot(sim.shots(), &report));
    }
    match &report.summary {
        Some(summary) => {
            print_summary(summary, json)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn run_interactive(sim: &mut CombatSim, profiles: &[DamageProfile], json: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("shot {} > ", sim.shots() + 1);
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "退出") {
            break;
        }
        let event = match line.parse::<HitEvent>() {
            Ok(e) => e,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if fire(sim, profiles, event, json)? {
            return Ok(());
        }
    }
    if sim.state() == SimState::Running && sim.shots() > 0 {
        print_summary(&sim.summary(), json)?;
    }
    Ok(())
}

fn run_sample(
    cfg: &CliConfig,
    trials: u32,
    profiles: &[DamageProfile],
    target: &Combatant,
) -> Result<()> {
    let items = match &cfg.events {
        Some(items) => items.clone(),
        None => DEFAULT_SAMPLE_EVENTS.split(',').map(str::to_string).collect(),
    };
    let mut weights: Vec<(HitEvent, u32)> = Vec::new();
    for event in parse_events(&items)? {
        match weights.iter_mut().find(|(e, _)| *e == event) {
            Some((_, w)) => *w += 1,
            None => weights.push((event, 1)),
        }
    }
    let distribution = HitDistribution::new(weights)?;
    let result = armor_sim::sample_kills(
        profiles,
        target,
        cfg.distance,
        &distribution,
        trials,
        cfg.seed,
        cfg.max_shots,
    )?;
    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!(
        "{} of {} trials killed (seed {})",
        result.kills, result.trials, cfg.seed
    );
    if let (Some(shots), Some(mean), Some(fast), Some(slow)) = (
        result.mean_shots,
        result.mean_elapsed_ms,
        result.fastest_ms,
        result.slowest_ms,
    ) {
        println!("  mean shots {shots} | mean time {mean} ms | fastest {fast} ms | slowest {slow} ms");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cfg = parse_args(std::env::args().skip(1))?;
    if cfg.help {
        println!("{USAGE}");
        return Ok(());
    }
    if cfg.version {
        println!(
            "armor-cli {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    // Logging setup; stdout carries results only
    let default_level = if cfg.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let catalog = Catalog::load_dir(&cfg.catalog)
        .with_context(|| format!("loading catalog {}", cfg.catalog.display()))?;
    if cfg.list {
        print_catalog(&catalog);
        return Ok(());
    }
    if cfg.kill_threshold {
        return run_kill_threshold(&cfg, &catalog);
    }
    let profiles = load_profiles(&cfg, &catalog)?;
    if cfg.ttk {
        return run_ttk(&profiles, cfg.distance, cfg.json);
    }
    let target = load_target(&cfg, &catalog)?;
    let chain: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
    info!(
        profile = %chain.join(" > "),
        distance = %cfg.distance,
        "starting simulation"
    );
    debug!(?cfg, "configuration");

    if let Some(trials) = cfg.sample {
        return run_sample(&cfg, trials, &profiles, &target);
    }
    let mut sim = CombatSim::new(target, cfg.distance)?;
    match &cfg.events {
        Some(items) => {
            for event in parse_events(items)? {
                if fire(&mut sim, &profiles, event, cfg.json)? {
                    return Ok(());
                }
            }
            print_summary(&sim.summary(), cfg.json)
        }
        None => run_interactive(&mut sim, &profiles, cfg.json),
    }
}
