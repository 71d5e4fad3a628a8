//! Database schema and operations for stored planning runs

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{BuildingType, CostedSegment, Difficulty, PhaseAssignment, PlanEntry, SegmentKind};
use crate::phases::HospitalCompliance;
use crate::planner::PlanReport;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per planning run
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            input TEXT NOT NULL,
            steps INTEGER NOT NULL,
            buildings INTEGER NOT NULL,
            segments INTEGER NOT NULL
        );

        -- Ordered repair plan
        CREATE TABLE IF NOT EXISTS plan_steps (
            run_id INTEGER NOT NULL,
            step INTEGER NOT NULL,
            building_id TEXT NOT NULL,
            difficulty REAL,
            infinite INTEGER NOT NULL,
            segments_repaired INTEGER NOT NULL,
            houses INTEGER NOT NULL,
            length REAL NOT NULL,
            PRIMARY KEY (run_id, step)
        );

        -- Phase table in reporting order
        CREATE TABLE IF NOT EXISTS phase_assignments (
            run_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            phase INTEGER NOT NULL,
            building_id TEXT NOT NULL,
            building_type TEXT NOT NULL,
            material_cost REAL NOT NULL,
            labor_cost REAL NOT NULL,
            total_cost REAL NOT NULL,
            duration REAL NOT NULL,
            segments INTEGER NOT NULL,
            PRIMARY KEY (run_id, position)
        );

        -- Segments worked on for each phase assignment
        CREATE TABLE IF NOT EXISTS phase_segments (
            run_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            segment_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            length REAL NOT NULL,
            person_hours REAL NOT NULL,
            duration REAL NOT NULL,
            material_cost REAL NOT NULL,
            labor_cost REAL NOT NULL,
            PRIMARY KEY (run_id, position, segment_id)
        );

        CREATE TABLE IF NOT EXISTS hospital_compliance (
            run_id INTEGER PRIMARY KEY,
            max_duration REAL NOT NULL,
            deadline REAL NOT NULL,
            compliant INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_phase_assignments_phase ON phase_assignments(run_id, phase);
        "#,
    )?;
    Ok(())
}

/// Store a complete report as a new run. Returns the run id.
pub fn save_report(conn: &mut Connection, input: &str, report: &PlanReport) -> Result<i64> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO runs (input, steps, buildings, segments) VALUES (?1, ?2, ?3, ?4)",
        (
            input,
            report.repair.entries.len() as i64,
            report.buildings as i64,
            report.segments as i64,
        ),
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO plan_steps (run_id, step, building_id, difficulty, infinite, segments_repaired, houses, length)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for entry in &report.repair.entries {
            let difficulty = match entry.difficulty {
                Difficulty::Finite(v) => Some(v),
                Difficulty::Infinite => None,
            };
            stmt.execute((
                run_id,
                entry.step as i64,
                &entry.building_id,
                difficulty,
                entry.difficulty.is_infinite(),
                entry.segments_repaired as i64,
                entry.houses as i64,
                entry.length,
            ))?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO phase_assignments (run_id, position, phase, building_id, building_type, material_cost, labor_cost, total_cost, duration, segments)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for (position, a) in report.phases.assignments.iter().enumerate() {
            stmt.execute((
                run_id,
                position as i64,
                a.phase,
                &a.building_id,
                a.building_type.as_str(),
                a.material_cost,
                a.labor_cost,
                a.total_cost(),
                a.duration,
                a.segments.len() as i64,
            ))?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO phase_segments (run_id, position, segment_id, kind, length, person_hours, duration, material_cost, labor_cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for (position, a) in report.phases.assignments.iter().enumerate() {
            for seg in &a.segments {
                stmt.execute((
                    run_id,
                    position as i64,
                    &seg.id,
                    seg.kind.to_string(),
                    seg.length,
                    seg.person_hours,
                    seg.duration,
                    seg.material_cost,
                    seg.labor_cost,
                ))?;
            }
        }
    }

    let compliance = report.phases.compliance;
    tx.execute(
        "INSERT INTO hospital_compliance (run_id, max_duration, deadline, compliant) VALUES (?1, ?2, ?3, ?4)",
        (run_id, compliance.max_duration, compliance.deadline, compliance.compliant),
    )?;

    tx.commit()?;
    Ok(run_id)
}

/// Id of the most recent run, if any
pub fn latest_run(conn: &Connection) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT MAX(id) FROM runs", [], |row| row.get::<_, Option<i64>>(0))
        .optional()?
        .flatten();
    Ok(id)
}

/// Get the repair plan of a run, in step order
pub fn load_plan(conn: &Connection, run_id: i64) -> Result<Vec<PlanEntry>> {
    let mut stmt = conn.prepare(
        "SELECT step, building_id, difficulty, infinite, segments_repaired, houses, length
         FROM plan_steps
         WHERE run_id = ?1
         ORDER BY step",
    )?;

    let rows = stmt.query_map([run_id], |row| {
        let infinite: bool = row.get(3)?;
        let difficulty = if infinite {
            Difficulty::Infinite
        } else {
            Difficulty::Finite(row.get::<_, Option<f64>>(2)?.unwrap_or(0.0))
        };
        Ok(PlanEntry {
            step: row.get::<_, i64>(0)? as usize,
            building_id: row.get(1)?,
            difficulty,
            segments_repaired: row.get::<_, i64>(4)? as usize,
            houses: row.get::<_, i64>(5)? as u64,
            length: row.get(6)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Get the phase table of a run, in reporting order, with each assignment's segments
pub fn load_phases(conn: &Connection, run_id: i64) -> Result<Vec<PhaseAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT phase, building_id, building_type, material_cost, labor_cost, duration
         FROM phase_assignments
         WHERE run_id = ?1
         ORDER BY position",
    )?;

    let rows = stmt.query_map([run_id], |row| {
        let building_type: String = row.get(2)?;
        Ok(PhaseAssignment {
            phase: row.get(0)?,
            building_id: row.get(1)?,
            building_type: BuildingType::from_normalized(&building_type),
            material_cost: row.get(3)?,
            labor_cost: row.get(4)?,
            duration: row.get(5)?,
            segments: Vec::new(),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT segment_id, kind, length, person_hours, duration, material_cost, labor_cost
         FROM phase_segments
         WHERE run_id = ?1 AND position = ?2
         ORDER BY segment_id",
    )?;
    for (position, assignment) in results.iter_mut().enumerate() {
        let rows = stmt.query_map((run_id, position as i64), |row| {
            let kind: String = row.get(1)?;
            Ok(CostedSegment {
                id: row.get(0)?,
                kind: SegmentKind::from_normalized(&kind),
                length: row.get(2)?,
                person_hours: row.get(3)?,
                duration: row.get(4)?,
                material_cost: row.get(5)?,
                labor_cost: row.get(6)?,
            })
        })?;
        for row in rows {
            assignment.segments.push(row?);
        }
    }
    Ok(results)
}

pub fn load_compliance(conn: &Connection, run_id: i64) -> Result<Option<HospitalCompliance>> {
    let compliance = conn
        .query_row(
            "SELECT max_duration, deadline, compliant FROM hospital_compliance WHERE run_id = ?1",
            [run_id],
            |row| {
                Ok(HospitalCompliance {
                    max_duration: row.get(0)?,
                    deadline: row.get(1)?,
                    compliant: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(compliance)
}

/// Clear all stored runs
pub fn clear_results(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM hospital_compliance;
        DELETE FROM phase_segments;
        DELETE FROM phase_assignments;
        DELETE FROM plan_steps;
        DELETE FROM runs;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{InputRow, SegmentKind};
    use crate::planner::plan;

    fn report() -> PlanReport {
        let rows = vec![
            InputRow {
                building_id: "H1".to_string(),
                building_type: BuildingType::Hospital,
                infra_id: "I1".to_string(),
                infra_kind: SegmentKind::Aerial,
                length: 8.0,
                house_count: 2,
            },
            InputRow {
                building_id: "R1".to_string(),
                building_type: BuildingType::Residential,
                infra_id: "I2".to_string(),
                infra_kind: SegmentKind::Conduit,
                length: 20.0,
                house_count: 4,
            },
        ];
        plan(&rows, &PlannerConfig::default()).unwrap()
    }

    #[test]
    fn test_report_round_trips_through_sqlite() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(latest_run(&conn).unwrap(), None);

        let report = report();
        let run_id = save_report(&mut conn, "network.csv", &report).unwrap();
        assert_eq!(latest_run(&conn).unwrap(), Some(run_id));

        assert_eq!(load_plan(&conn, run_id).unwrap(), report.repair.entries);
        assert_eq!(load_phases(&conn, run_id).unwrap(), report.phases.assignments);
        assert_eq!(load_compliance(&conn, run_id).unwrap(), Some(report.phases.compliance));

        let (input, steps, buildings, segments): (String, i64, i64, i64) = conn
            .query_row(
                "SELECT input, steps, buildings, segments FROM runs WHERE id = ?1",
                [run_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(input, "network.csv");
        assert_eq!((steps, buildings, segments), (2, 2, 2));

        clear_results(&conn).unwrap();
        assert_eq!(latest_run(&conn).unwrap(), None);
    }

    #[test]
    fn test_phase_segments_survive_storage() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let report = report();
        let run_id = save_report(&mut conn, "network.csv", &report).unwrap();

        let phases = load_phases(&conn, run_id).unwrap();
        let h1 = phases.iter().find(|a| a.building_id == "H1").unwrap();
        assert_eq!(h1.segment_ids().collect::<Vec<_>>(), vec!["I1"]);
        assert_eq!(h1.segments[0].kind, SegmentKind::Aerial);
        assert_eq!(h1.segments[0].person_hours, 16.0);
        let r1 = phases.iter().find(|a| a.building_id == "R1").unwrap();
        assert_eq!(r1.segments[0].kind, SegmentKind::Conduit);
        assert_eq!(r1.segments[0].material_cost, 18_000.0);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.db");
        let conn = Connection::open(&path).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(load_plan(&conn, 1).unwrap(), Vec::new());
    }
}
