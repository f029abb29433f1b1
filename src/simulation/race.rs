//! Race Simulator
//!
//! Projects each entrant's elapsed time at the track's checkpoint distances
//! from its predicted finish time. The first checkpoint uses the best
//! historical sectional when it is plausible; later checkpoints follow a
//! constant second-phase speed that lands exactly on the predicted finish.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::core::config::ModelConfig;
use crate::models::{compare_times, format_time, PredictionResult, RaceDefinition};

/// A named distance at which the field is reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub distance: u32,
    pub label: String,
}

/// Estimated elapsed times for one entrant, keyed by checkpoint distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTrace {
    pub name: String,
    pub box_no: u8,
    pub times: BTreeMap<u32, Option<f64>>,
}

impl CheckpointTrace {
    pub fn time_at(&self, distance: u32) -> Option<f64> {
        self.times.get(&distance).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub name: String,
    pub box_no: u8,
    pub time: Option<f64>,
}

/// Running order at one checkpoint, unknown times last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub checkpoint: Checkpoint,
    pub entries: Vec<LeaderboardEntry>,
}

/// Full simulation of a race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSimulation {
    pub track: String,
    pub distance: u32,
    /// False when the track+distance has no configured checkpoints
    pub has_checkpoints: bool,
    pub checkpoints: Vec<Checkpoint>,
    /// In prediction rank order
    pub traces: Vec<CheckpointTrace>,
}

impl RaceSimulation {
    pub fn leaderboards(&self) -> Vec<Leaderboard> {
        self.checkpoints
            .iter()
            .map(|checkpoint| {
                let mut order: Vec<&CheckpointTrace> = self.traces.iter().collect();
                // stable: equal times keep prediction order
                order.sort_by(|a, b| {
                    compare_times(a.time_at(checkpoint.distance), b.time_at(checkpoint.distance))
                });
                Leaderboard {
                    checkpoint: checkpoint.clone(),
                    entries: order
                        .into_iter()
                        .enumerate()
                        .map(|(i, trace)| LeaderboardEntry {
                            position: i + 1,
                            name: trace.name.clone(),
                            box_no: trace.box_no,
                            time: trace.time_at(checkpoint.distance),
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl fmt::Display for RaceSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_checkpoints {
            writeln!(
                f,
                "No intermediate checkpoints defined for '{}' at {}m; showing Start and Finish only.",
                self.track, self.distance
            )?;
        }
        writeln!(f, "--- Race simulation: '{}', {}m ---", self.track, self.distance)?;

        for board in self.leaderboards() {
            writeln!(f)?;
            writeln!(
                f,
                "At {} ({}m):",
                board.checkpoint.label, board.checkpoint.distance
            )?;
            writeln!(f, "{}", "-".repeat(30))?;
            for entry in &board.entries {
                let time = match entry.time {
                    Some(_) => format!("{}s", format_time(entry.time)),
                    None => format_time(None),
                };
                writeln!(
                    f,
                    "{:<5}{:<5}{:<20} ({})",
                    entry.position, entry.box_no, entry.name, time
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "--- End of simulation ---")
    }
}

/// Checkpoint simulator over a configured checkpoint table
pub struct RaceSimulator<'a> {
    config: &'a ModelConfig,
}

impl<'a> RaceSimulator<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Start, labelled intermediates and finish for a track code and distance.
    ///
    /// Returns false alongside start+finish when nothing is configured.
    pub fn checkpoints(&self, track_code: &str, distance: u32) -> (Vec<Checkpoint>, bool) {
        let intermediates: Vec<u32> = match self.config.checkpoints_for(track_code, distance) {
            Some(points) => {
                let mut points: Vec<u32> = points
                    .iter()
                    .copied()
                    .filter(|d| *d > 0 && *d < distance)
                    .collect();
                points.sort_unstable();
                points.dedup();
                points
            }
            None => return (endpoints(distance), false),
        };
        if intermediates.is_empty() {
            return (endpoints(distance), false);
        }

        let last = intermediates.len().saturating_sub(1);
        let mut checkpoints = vec![Checkpoint {
            distance: 0,
            label: "Start".to_string(),
        }];
        for (i, d) in intermediates.iter().enumerate() {
            let label = if i == 0 {
                format!("First point (~{}m)", d)
            } else if i == last {
                format!("Last intermediate (~{}m)", d)
            } else {
                format!("Intermediate (~{}m)", d)
            };
            checkpoints.push(Checkpoint {
                distance: *d,
                label,
            });
        }
        checkpoints.push(Checkpoint {
            distance,
            label: "Finish".to_string(),
        });
        (checkpoints, true)
    }

    /// Simulate a race from ranked predictions
    pub fn simulate(&self, results: &[PredictionResult], race: &RaceDefinition) -> RaceSimulation {
        let (track_code, _) = self.config.resolve_track(&race.track);
        let (checkpoints, has_checkpoints) = self.checkpoints(&track_code, race.distance);
        let points: Vec<u32> = checkpoints.iter().map(|c| c.distance).collect();

        if !has_checkpoints {
            info!(
                "No checkpoints for {} {}m; simulating start and finish only",
                track_code, race.distance
            );
        }

        let traces = results
            .iter()
            .map(|result| CheckpointTrace {
                name: result.name.clone(),
                box_no: result.box_no,
                times: trace_times(
                    &points,
                    race.distance,
                    result.predicted_time,
                    result.indicators.best_sectional,
                ),
            })
            .collect();

        RaceSimulation {
            track: race.track.trim().to_string(),
            distance: race.distance,
            has_checkpoints,
            checkpoints,
            traces,
        }
    }
}

fn endpoints(distance: u32) -> Vec<Checkpoint> {
    vec![
        Checkpoint {
            distance: 0,
            label: "Start".to_string(),
        },
        Checkpoint {
            distance,
            label: "Finish".to_string(),
        },
    ]
}

/// Elapsed time at each point for one entrant
///
/// `points` is sorted and starts at 0 and ends at `distance`.
pub fn trace_times(
    points: &[u32],
    distance: u32,
    predicted: Option<f64>,
    best_sectional: Option<f64>,
) -> BTreeMap<u32, Option<f64>> {
    let mut times: BTreeMap<u32, Option<f64>> = points.iter().map(|p| (*p, None)).collect();

    let predicted = match predicted {
        Some(t) => t,
        None => return times,
    };
    times.insert(0, Some(0.0));
    times.insert(distance, Some(predicted));

    if distance == 0 || predicted <= 0.0 {
        return times;
    }
    let total = f64::from(distance);
    let average_speed = total / predicted;

    let intermediates: Vec<u32> = points
        .iter()
        .copied()
        .filter(|p| *p > 0 && *p < distance)
        .collect();
    let first = match intermediates.first() {
        Some(first) => *first,
        None => return times,
    };

    let first_time = match best_sectional {
        Some(s) if s > 0.0 && s < predicted => s,
        _ => f64::from(first) / average_speed,
    };
    times.insert(first, Some(first_time));

    let remaining_distance = total - f64::from(first);
    let remaining_time = predicted - first_time;
    if remaining_distance > 0.0 && remaining_time > 0.0 {
        let second_speed = remaining_distance / remaining_time;
        for p in &intermediates[1..] {
            times.insert(*p, Some(first_time + f64::from(p - first) / second_speed));
        }
    }

    debug!("trace: {:?}", times);
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::EntrantIndicators;
    use crate::models::{AdjustmentBreakdown, RaceEntrant};

    fn result(name: &str, box_no: u8, predicted: Option<f64>, sectional: Option<f64>) -> PredictionResult {
        let mut indicators = EntrantIndicators::no_history(name, box_no);
        indicators.best_sectional = sectional;
        PredictionResult {
            name: name.to_string(),
            box_no,
            race_grade: "A2".to_string(),
            indicators,
            base_time: predicted,
            adjustments: AdjustmentBreakdown::default(),
            predicted_time: predicted,
        }
    }

    fn race(track: &str, distance: u32) -> RaceDefinition {
        RaceDefinition {
            track: track.to_string(),
            distance,
            grade: "A2".to_string(),
            date: None,
            entrants: vec![RaceEntrant {
                name: "Fast Dog".to_string(),
                box_no: 3,
            }],
        }
    }

    #[test]
    fn test_checkpoint_labels() {
        let config = ModelConfig::default();
        let (points, found) = RaceSimulator::new(&config).checkpoints("Tow", 500);
        assert!(found);
        let labels: Vec<&str> = points.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Start",
                "First point (~100m)",
                "Intermediate (~250m)",
                "Intermediate (~350m)",
                "Last intermediate (~450m)",
                "Finish"
            ]
        );
    }

    #[test]
    fn test_unknown_prediction_all_unknown() {
        let times = trace_times(&[0, 100, 250, 350, 450, 500], 500, None, Some(5.0));
        assert_eq!(times.len(), 6);
        assert!(times.values().all(|t| t.is_none()));
    }

    #[test]
    fn test_sectional_informed_first_point() {
        let times = trace_times(&[0, 100, 250, 350, 450, 500], 500, Some(28.0), Some(5.0));
        assert_eq!(times[&0], Some(0.0));
        assert_eq!(times[&100], Some(5.0));
        assert!((times[&250].unwrap() - 13.625).abs() < 1e-9);
        assert!((times[&450].unwrap() - 25.125).abs() < 1e-9);
        assert_eq!(times[&500], Some(28.0));
    }

    #[test]
    fn test_implausible_sectional_falls_back_to_average_speed() {
        for sectional in [None, Some(0.0), Some(30.0)] {
            let times = trace_times(&[0, 100, 250, 500], 500, Some(28.0), sectional);
            assert!((times[&100].unwrap() - 5.6).abs() < 1e-9);
            assert!((times[&250].unwrap() - 14.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_times_monotonic() {
        let times = trace_times(&[0, 50, 150, 300, 450, 550, 592], 592, Some(37.2), Some(3.4));
        let values: Vec<f64> = times.values().map(|t| t.unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_no_checkpoints_falls_back_to_start_finish() {
        let config = ModelConfig::default();
        let simulator = RaceSimulator::new(&config);
        let sim = simulator.simulate(&[result("Fast Dog", 3, Some(29.0), Some(4.9))], &race("Hove", 515));
        assert!(!sim.has_checkpoints);
        assert_eq!(sim.checkpoints.len(), 2);
        assert_eq!(sim.traces[0].time_at(0), Some(0.0));
        assert_eq!(sim.traces[0].time_at(515), Some(29.0));
        assert!(sim.to_string().contains("No intermediate checkpoints"));
    }

    #[test]
    fn test_table_entry_without_inner_points() {
        let mut config = ModelConfig::default();
        config
            .checkpoints
            .entry("Tow".to_string())
            .or_default()
            .insert(480, vec![0, 480, 600]);
        let simulator = RaceSimulator::new(&config);
        let (points, found) = simulator.checkpoints("Tow", 480);
        assert!(!found);
        assert_eq!(points.len(), 2);

        let sim = simulator.simulate(&[result("Fast Dog", 3, Some(28.0), None)], &race("Tow", 480));
        assert!(!sim.has_checkpoints);
        assert!(sim.to_string().contains("No intermediate checkpoints"));
    }

    #[test]
    fn test_leaderboard_unknown_last() {
        let config = ModelConfig::default();
        let simulator = RaceSimulator::new(&config);
        let results = vec![
            result("Fast Dog", 3, Some(28.0), Some(5.2)),
            result("Early Bird", 1, Some(28.4), Some(4.8)),
            result("Ghost", 6, None, None),
        ];
        let sim = simulator.simulate(&results, &race("Towcester", 500));
        assert!(sim.has_checkpoints);

        let boards = sim.leaderboards();
        assert_eq!(boards.len(), 6);
        let first_point: Vec<&str> = boards[1].entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(first_point, vec!["Early Bird", "Fast Dog", "Ghost"]);
        let finish: Vec<&str> = boards[5].entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(finish, vec!["Fast Dog", "Early Bird", "Ghost"]);
        assert_eq!(boards[5].entries[2].time, None);

        let text = sim.to_string();
        assert!(text.contains("At First point (~100m) (100m):"));
        assert!(text.contains("(N/A)"));
        assert!(text.contains("(28.00s)"));
    }
}
