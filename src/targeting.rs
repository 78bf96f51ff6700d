use crate::core::{ArenaConfig, ShootingMode, TransportError};
use crate::movement::at_edge;
use crate::transport::Transport;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use tracing::{debug, trace};

/// Початки чотирьох чвертей кола.
const QUADRANT_STARTS: [f64; 4] = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2];

/// Курс утечі для кожної чверті: протилежна чверть зі зсувом на 45°.
const FLEE_HEADINGS: [f64; 4] = [5.0 * FRAC_PI_4, 7.0 * FRAC_PI_4, FRAC_PI_4, 3.0 * FRAC_PI_4];

/// Напрямок і дальність пострілу.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireSolution {
    pub direction: f64,
    pub distance: f64,
}

/// Локалізує суперника бісекцією кола за `depth` рівнів.
///
/// На кожному рівні сканується ліва половина поточного інтервалу; якщо вона
/// порожня, пошук переходить у праву. На останньому рівні порожній сектор
/// перевіряється ще раз у сусідньому секторі тієї ж ширини, бо суперник міг
/// вийти з нього між скануваннями. `None` означає, що ціль втрачено.
pub async fn locate<T: Transport>(
    transport: &mut T,
    depth: u32,
) -> Result<Option<FireSolution>, TransportError> {
    let mut start = 0.0;
    let mut width = PI;

    for level in 1..depth.max(1) {
        let distance = transport.scan(start, start + width).await?;
        trace!(level, start, width, distance, "Сканування");
        if distance == 0.0 {
            start += width;
        }
        width /= 2.0;
    }

    let mut distance = transport.scan(start, start + width).await?;
    trace!(start, width, distance, "Останнє сканування");
    if distance == 0.0 {
        distance = transport.scan(start + width, start + 2.0 * width).await?;
        if distance == 0.0 {
            debug!(start, width, "Ціль вийшла з сектора, пропускаємо постріл");
            return Ok(None);
        }
        start += width;
    }

    Ok(Some(FireSolution {
        direction: start + width / 2.0,
        distance,
    }))
}

/// Керування гарматою: не більше одного снаряда в польоті.
pub struct FireControl {
    mode: ShootingMode,
    depth: u32,
}

impl FireControl {
    pub fn new(depth: u32) -> Self {
        Self {
            mode: ShootingMode::Scanning,
            depth,
        }
    }

    pub fn mode(&self) -> ShootingMode {
        self.mode
    }

    /// Один такт: або чекає вибуху снаряда, або шукає ціль і стріляє.
    pub async fn step<T: Transport>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        match self.mode {
            ShootingMode::AwaitingDetonation => {
                if !transport.shell_in_progress().await? {
                    trace!("Снаряд вибухнув, гармата готова");
                    self.mode = ShootingMode::Scanning;
                }
                Ok(())
            }
            ShootingMode::Scanning => {
                let Some(solution) = locate(transport, self.depth).await? else {
                    return Ok(());
                };
                self.mode = ShootingMode::AwaitingDetonation;
                transport.fire(solution.direction, solution.distance).await?;
                debug!(
                    direction = solution.direction,
                    distance = solution.distance,
                    "Постріл"
                );
                Ok(())
            }
        }
    }
}

/// Курс утечі від найближчого суперника або `None`, якщо всі чверті порожні.
pub fn flee_heading(quadrants: &[f64; 4]) -> Option<f64> {
    quadrants
        .iter()
        .zip(FLEE_HEADINGS)
        .filter(|(distance, _)| **distance > 0.0)
        .min_by(|a, b| a.0.total_cmp(b.0))
        .map(|(_, heading)| heading)
}

/// Оборонна поведінка: тікати від найближчого суперника, не стріляючи.
pub struct Evader {
    quadrants: [f64; 4],
    speed: f64,
}

impl Evader {
    pub fn new(speed: f64) -> Self {
        Self {
            quadrants: [0.0; 4],
            speed,
        }
    }

    pub async fn step<T: Transport>(
        &mut self,
        transport: &mut T,
        arena: &ArenaConfig,
    ) -> Result<(), TransportError> {
        let position = transport.get_location().await?;
        if at_edge(position, arena) {
            debug!(x = position.x, y = position.y, "Біля краю арени, зупинка");
            return transport.set_speed(0.0).await;
        }

        for (slot, start) in self.quadrants.iter_mut().zip(QUADRANT_STARTS) {
            *slot = transport.scan(start, start + FRAC_PI_2).await?;
        }
        trace!(quadrants = ?self.quadrants, "Чверті проскановано");

        match flee_heading(&self.quadrants) {
            Some(heading) => {
                transport.set_direction(heading).await?;
                transport.set_speed(self.speed).await
            }
            None => {
                debug!("Суперників не видно");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Reply, Request};
    use crate::testing::ScriptedTransport;
    use approx::assert_relative_eq;

    fn scans(distances: &[f64]) -> ScriptedTransport {
        let mut transport = ScriptedTransport::new();
        for distance in distances {
            transport.push(ScriptedTransport::scan(*distance));
        }
        transport
    }

    fn scanned_arcs(sent: &[Request]) -> Vec<(f64, f64)> {
        sent.iter()
            .filter_map(|request| match request {
                Request::Scan {
                    start_radians,
                    end_radians,
                } => Some((*start_radians, *end_radians)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_narrows_into_second_half() {
        let mut transport = scans(&[0.0, 7.0, 7.0]);

        let solution = locate(&mut transport, 3).await.unwrap().unwrap();

        let arcs = scanned_arcs(&transport.sent);
        assert_eq!(arcs.len(), 3);
        assert_relative_eq!(arcs[0].0, 0.0);
        assert_relative_eq!(arcs[0].1, PI);
        assert_relative_eq!(arcs[1].0, PI);
        assert_relative_eq!(arcs[1].1, 1.5 * PI);
        assert_relative_eq!(arcs[2].0, PI);
        assert_relative_eq!(arcs[2].1, 1.25 * PI);
        assert_relative_eq!(solution.direction, PI + PI / 8.0);
        assert_eq!(solution.distance, 7.0);
    }

    #[tokio::test]
    async fn test_fallback_probe_moves_to_adjacent_arc() {
        let mut transport = scans(&[0.0, 7.0, 0.0, 9.0]);

        let solution = locate(&mut transport, 3).await.unwrap().unwrap();

        let arcs = scanned_arcs(&transport.sent);
        assert_eq!(arcs.len(), 4);
        assert_relative_eq!(arcs[3].0, 1.25 * PI);
        assert_relative_eq!(arcs[3].1, 1.5 * PI);
        assert_relative_eq!(solution.direction, 1.25 * PI + PI / 8.0);
        assert_eq!(solution.distance, 9.0);
    }

    #[tokio::test]
    async fn test_lost_target_skips_fire() {
        let mut transport = scans(&[5.0, 5.0, 0.0, 0.0]);
        let mut fire = FireControl::new(3);

        fire.step(&mut transport).await.unwrap();

        assert_eq!(fire.mode(), ShootingMode::Scanning);
        assert_eq!(scanned_arcs(&transport.sent).len(), 4);
        assert!(!transport
            .sent
            .iter()
            .any(|r| matches!(r, Request::Fire { .. })));
    }

    #[tokio::test]
    async fn test_single_level_depth() {
        let mut transport = scans(&[0.0, 4.0]);

        let solution = locate(&mut transport, 1).await.unwrap().unwrap();

        assert_relative_eq!(solution.direction, 1.5 * PI);
        assert_eq!(scanned_arcs(&transport.sent).len(), 2);
    }

    #[tokio::test]
    async fn test_never_fires_into_empty_arc() {
        // Усі комбінації порожніх і зайнятих секторів на трьох рівнях плюс запасне сканування.
        for pattern in 0u32..16 {
            let distances: Vec<f64> = (0..4)
                .map(|bit| if pattern & (1 << bit) != 0 { 3.0 } else { 0.0 })
                .collect();
            let mut transport = scans(&distances);

            let solution = locate(&mut transport, 3).await.unwrap();

            let arcs = scanned_arcs(&transport.sent);
            assert!(arcs.len() <= 4);
            let Some(solution) = solution else { continue };
            for ((start, end), distance) in arcs.iter().zip(&distances) {
                if *distance == 0.0 {
                    assert!(
                        solution.direction < *start || solution.direction >= *end,
                        "pattern {pattern}: fired into empty arc [{start}, {end})"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_waits_for_detonation_before_next_shot() {
        let mut transport = scans(&[3.0, 3.0, 3.0]);
        transport.push(Reply::Canon {
            shell_in_progress: true,
        });
        transport.push(Reply::Canon {
            shell_in_progress: false,
        });
        let mut fire = FireControl::new(3);

        fire.step(&mut transport).await.unwrap();
        assert_eq!(fire.mode(), ShootingMode::AwaitingDetonation);
        assert_eq!(
            transport.take_sent().last(),
            Some(&Request::Fire {
                direction: PI / 8.0,
                distance: 3.0
            })
        );

        fire.step(&mut transport).await.unwrap();
        assert_eq!(fire.mode(), ShootingMode::AwaitingDetonation);
        fire.step(&mut transport).await.unwrap();
        assert_eq!(fire.mode(), ShootingMode::Scanning);

        assert_eq!(transport.sent, vec![Request::GetCanon, Request::GetCanon]);
    }

    #[test]
    fn test_flee_from_nearest_quadrant() {
        assert_relative_eq!(flee_heading(&[5.0, 0.0, 3.0, 8.0]).unwrap(), PI / 4.0);
        assert_relative_eq!(flee_heading(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 5.0 * PI / 4.0);
        assert_relative_eq!(flee_heading(&[0.0, 2.0, 0.0, 0.0]).unwrap(), 7.0 * PI / 4.0);
        assert_relative_eq!(flee_heading(&[9.0, 9.0, 9.0, 1.0]).unwrap(), 3.0 * PI / 4.0);
        assert_eq!(flee_heading(&[0.0; 4]), None);
    }

    #[tokio::test]
    async fn test_evader_stops_at_edge() {
        let arena = ArenaConfig {
            arena_size: 1000.0,
            bot_radius: 20.0,
        };
        let mut transport = ScriptedTransport::new().reply(ScriptedTransport::location(21.0, 500.0));
        let mut evader = Evader::new(30.0);

        evader.step(&mut transport, &arena).await.unwrap();

        assert_eq!(
            transport.sent,
            vec![
                Request::GetLocation,
                Request::SetSpeed {
                    requested_speed: 0.0
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_evader_flees() {
        let arena = ArenaConfig {
            arena_size: 1000.0,
            bot_radius: 20.0,
        };
        let mut transport = ScriptedTransport::new().reply(ScriptedTransport::location(500.0, 500.0));
        for distance in [5.0, 0.0, 3.0, 8.0] {
            transport.push(ScriptedTransport::scan(distance));
        }
        let mut evader = Evader::new(30.0);

        evader.step(&mut transport, &arena).await.unwrap();

        assert_eq!(evader.quadrants, [5.0, 0.0, 3.0, 8.0]);
        let arcs = scanned_arcs(&transport.sent);
        assert_eq!(arcs.len(), 4);
        assert_relative_eq!(arcs[3].0, 1.5 * PI);
        assert_relative_eq!(arcs[3].1, 2.0 * PI);
        assert_eq!(
            &transport.sent[5..],
            &[
                Request::SetDirection {
                    requested_direction: FRAC_PI_4
                },
                Request::SetSpeed {
                    requested_speed: 30.0
                }
            ]
        );
    }
}
