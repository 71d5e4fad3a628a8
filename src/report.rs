//! Console summaries and CSV export

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{Difficulty, PhaseAssignment, PlanEntry};
use crate::phases::{HospitalCompliance, PhaseTable};
use crate::planner::PlanReport;
use crate::scheduler::{RepairPlan, SchedulerState};

/// Step table for a list of plan entries
pub struct PlanListing<'a>(pub &'a [PlanEntry]);

impl fmt::Display for PlanListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>5} {:<20} {:>12} {:>9} {:>7} {:>10}",
            "Step", "Building", "Difficulty", "Repaired", "Houses", "Length (m)"
        )?;
        writeln!(f, "{}", "-".repeat(68))?;
        for e in self.0 {
            writeln!(
                f,
                "{:>5} {:<20} {:>12} {:>9} {:>7} {:>10.1}",
                e.step,
                e.building_id,
                e.difficulty.to_string(),
                e.segments_repaired,
                e.houses,
                e.length
            )?;
        }
        Ok(())
    }
}

/// Phase table listing, in reporting order
pub struct PhaseListing<'a>(pub &'a [PhaseAssignment]);

impl fmt::Display for PhaseListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>5} {:<20} {:<12} {:>12} {:>12} {:>12} {:>9}",
            "Phase", "Building", "Type", "Material", "Labor", "Total", "Hours"
        )?;
        writeln!(f, "{}", "-".repeat(88))?;
        for a in self.0 {
            writeln!(
                f,
                "{:>5} {:<20} {:<12} {:>12.2} {:>12.2} {:>12.2} {:>9.2}",
                a.phase,
                a.building_id,
                a.building_type.as_str(),
                a.material_cost,
                a.labor_cost,
                a.total_cost(),
                a.duration
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for RepairPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Repair Plan ===")?;
        write!(f, "{}", PlanListing(&self.entries))?;
        writeln!(f)?;
        match &self.state {
            SchedulerState::Done => writeln!(
                f,
                "{} steps, {} segments repaired, {} buildings needed no repair of their own",
                self.entries.len(),
                self.total_repaired(),
                self.no_repair_entries().count()
            ),
            SchedulerState::Stuck { buildings, segments } => {
                writeln!(f, "Plan stopped after {} steps.", self.entries.len())?;
                writeln!(f, "Unresolved buildings: {}", buildings.join(", "))?;
                writeln!(f, "Segments serving no house: {}", segments.join(", "))
            }
            SchedulerState::Ready => writeln!(f, "Plan in progress ({} steps)", self.entries.len()),
        }
    }
}

impl fmt::Display for HospitalCompliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Hospital Constraint ===")?;
        writeln!(f, "Longest hospital repair: {:.2} h", self.max_duration)?;
        writeln!(f, "Deadline:                {:.2} h", self.deadline)?;
        if self.compliant {
            writeln!(f, "Result: OK")
        } else {
            writeln!(f, "Result: NOT MET - at least one hospital exceeds the deadline at full crew")
        }
    }
}

impl fmt::Display for PhaseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Phase Summary ===")?;
        writeln!(
            f,
            "{:>5} {:>9} {:>14} {:>14} {:>14} {:>9} {:>7}",
            "Phase", "Buildings", "Material", "Labor", "Total", "Max h", "Share"
        )?;
        for s in self.summaries() {
            writeln!(
                f,
                "{:>5} {:>9} {:>14.2} {:>14.2} {:>14.2} {:>9.2} {:>6.1}%",
                s.phase,
                s.buildings,
                s.material_cost,
                s.labor_cost,
                s.total_cost,
                s.max_duration,
                s.share * 100.0
            )?;
        }
        writeln!(f)?;

        if !self.hospital_order.is_empty() {
            writeln!(f, "Hospital order: {}", self.hospital_order.join(" -> "))?;
            writeln!(f)?;
        }

        write!(f, "{}", PhaseListing(&self.assignments))
    }
}

fn difficulty_field(difficulty: Difficulty) -> String {
    match difficulty {
        Difficulty::Finite(v) => format!("{:.6}", v),
        Difficulty::Infinite => "inf".to_string(),
    }
}

/// Write the report as CSV files into `dir`. Returns the files written.
pub fn export_csv(report: &PlanReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut written = Vec::new();

    let path = dir.join("plan.csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record(["step", "building_id", "difficulty", "segments_repaired", "houses", "length"])?;
    for e in &report.repair.entries {
        w.write_record([
            e.step.to_string(),
            e.building_id.clone(),
            difficulty_field(e.difficulty),
            e.segments_repaired.to_string(),
            e.houses.to_string(),
            e.length.to_string(),
        ])?;
    }
    w.flush()?;
    written.push(path);

    let path = dir.join("no_repair.csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record(["building_id"])?;
    for e in report.repair.no_repair_entries() {
        w.write_record([&e.building_id])?;
    }
    w.flush()?;
    written.push(path);

    let path = dir.join("phases.csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record([
        "phase",
        "building_id",
        "building_type",
        "segments",
        "infras",
        "duration_h",
        "material_cost",
        "labor_cost",
        "total_cost",
    ])?;
    for a in &report.phases.assignments {
        w.write_record([
            a.phase.to_string(),
            a.building_id.clone(),
            a.building_type.to_string(),
            a.segments.len().to_string(),
            a.segment_ids().collect::<Vec<_>>().join(";"),
            format!("{:.2}", a.duration),
            format!("{:.2}", a.material_cost),
            format!("{:.2}", a.labor_cost),
            format!("{:.2}", a.total_cost()),
        ])?;
    }
    w.flush()?;
    written.push(path);

    let path = dir.join("phase_segments.csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record([
        "phase",
        "building_id",
        "segment_id",
        "kind",
        "length",
        "person_hours",
        "duration_h",
        "material_cost",
        "labor_cost",
        "total_cost",
    ])?;
    for a in &report.phases.assignments {
        for s in &a.segments {
            w.write_record([
                a.phase.to_string(),
                a.building_id.clone(),
                s.id.clone(),
                s.kind.to_string(),
                s.length.to_string(),
                format!("{:.2}", s.person_hours),
                format!("{:.2}", s.duration),
                format!("{:.2}", s.material_cost),
                format!("{:.2}", s.labor_cost),
                format!("{:.2}", s.total_cost()),
            ])?;
        }
    }
    w.flush()?;
    written.push(path);

    let path = dir.join("phase_summary.csv");
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record([
        "phase",
        "buildings",
        "material_cost",
        "labor_cost",
        "total_cost",
        "max_duration_h",
        "share",
    ])?;
    for s in report.phases.summaries() {
        w.write_record([
            s.phase.to_string(),
            s.buildings.to_string(),
            format!("{:.2}", s.material_cost),
            format!("{:.2}", s.labor_cost),
            format!("{:.2}", s.total_cost),
            format!("{:.2}", s.max_duration),
            format!("{:.4}", s.share),
        ])?;
    }
    w.flush()?;
    written.push(path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{BuildingType, InputRow, SegmentKind};
    use crate::planner::plan;

    fn report() -> PlanReport {
        let rows = [
            ("H1", BuildingType::Hospital, "I1", SegmentKind::Conduit, 100.0, 1),
            ("S1", BuildingType::School, "I2", SegmentKind::Aerial, 10.0, 5),
            ("R1", BuildingType::Residential, "I2", SegmentKind::Aerial, 0.0, 0),
        ]
        .into_iter()
        .map(|(b, t, i, k, l, h)| InputRow {
            building_id: b.to_string(),
            building_type: t,
            infra_id: i.to_string(),
            infra_kind: k,
            length: l,
            house_count: h,
        })
        .collect::<Vec<_>>();
        plan(&rows, &PlannerConfig::default()).unwrap()
    }

    #[test]
    fn test_console_summary_mentions_deadline_breach() {
        let report = report();
        let text = format!("{}{}{}", report.repair, report.phases.compliance, report.phases);
        assert!(text.contains("=== Repair Plan ==="));
        assert!(text.contains("NOT MET"));
        assert!(text.contains("Hospital order: H1"));
        assert!(text.contains("1 buildings needed no repair"));
    }

    #[test]
    fn test_export_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = export_csv(&report(), &dir.path().join("out")).unwrap();
        assert_eq!(files.len(), 5);

        let plan_csv = std::fs::read_to_string(dir.path().join("out/plan.csv")).unwrap();
        let lines: Vec<_> = plan_csv.lines().collect();
        assert_eq!(lines[0], "step,building_id,difficulty,segments_repaired,houses,length");
        assert_eq!(lines.len(), 4);

        let no_repair = std::fs::read_to_string(dir.path().join("out/no_repair.csv")).unwrap();
        assert_eq!(no_repair.lines().count(), 2);
    }

    #[test]
    fn test_export_lists_segments_per_phase() {
        let dir = tempfile::tempdir().unwrap();
        export_csv(&report(), dir.path()).unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("phase_segments.csv")).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let fields: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().take(4).collect()).collect();
        // I2 is shared, so both S1 and R1 carry it
        assert_eq!(
            fields,
            vec![
                vec!["0", "H1", "I1", "conduit"],
                vec!["1", "S1", "I2", "aerial"],
                vec!["2", "R1", "I2", "aerial"],
            ]
        );
        // conduit, 100 m: 500 person-hours, 125 h at full crew
        assert_eq!(&rows[0][5], "500.00");
        assert_eq!(&rows[0][6], "125.00");
        assert_eq!(&rows[0][9], "108750.00");

        let mut reader = csv::Reader::from_path(dir.path().join("phases.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        let infras = headers.iter().position(|h| h == "infras").unwrap();
        let lists: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[infras].to_string())
            .collect();
        assert_eq!(lists, vec!["I1", "I2", "I2"]);
    }
}
