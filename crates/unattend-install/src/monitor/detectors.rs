//! Built-in progress detectors, most to least trustworthy.

use std::time::Duration;

use unattend_core::{
    ControlInfo, MonitorSettings, ProgressContext, ProgressInspector, WindowInfo,
    descendants_deepest_first,
};

use super::text::{parse_percent, parse_progress_text};

const MIB: u64 = 1024 * 1024;

/// Default detector chain.
pub fn default_detectors(settings: &MonitorSettings) -> Vec<Box<dyn ProgressInspector>> {
    vec![
        Box::new(NativeProgressBar),
        Box::new(FrameworkHeuristic),
        Box::new(WindowTitle),
        Box::new(ResourceGrowth::new(settings.clone())),
        Box::new(ElapsedTime::new(
            settings.expected_install(),
            settings.estimate_cap_percent,
            settings.elapsed_floor_percent,
        )),
    ]
}

fn bar_percent(controls: &[ControlInfo]) -> Option<f64> {
    controls
        .iter()
        .filter(|c| c.is_progress_bar())
        .find_map(|c| c.progress.and_then(|range| range.percent()))
}

/// A standard progress-bar control in any installer window.
pub struct NativeProgressBar;

impl ProgressInspector for NativeProgressBar {
    fn name(&self) -> &'static str {
        "progress_bar"
    }

    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        ctx.windows
            .iter()
            .find_map(|w| bar_percent(&ctx.window_inspector.child_controls(w)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toolkit {
    Inno,
    Nsis,
    InstallShield,
    Msi,
}

fn recognise(window: &WindowInfo) -> Option<Toolkit> {
    let class = window.class_name.as_str();
    let title = window.title.to_lowercase();
    if class == "TWizardForm" || class == "TSetupForm" {
        Some(Toolkit::Inno)
    } else if class.starts_with("MsiDialog") {
        Some(Toolkit::Msi)
    } else if class.contains("InstallShield") || title.contains("installshield") {
        Some(Toolkit::InstallShield)
    } else if class == "#32770" && (title.contains("setup") || title.contains("install")) {
        Some(Toolkit::Nsis)
    } else {
        None
    }
}

/// Known installer toolkits: progress controls first, then status text.
pub struct FrameworkHeuristic;

impl ProgressInspector for FrameworkHeuristic {
    fn name(&self) -> &'static str {
        "framework"
    }

    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        ctx.windows
            .iter()
            .filter(|w| recognise(w).is_some())
            .find_map(|w| {
                let controls = ctx.window_inspector.child_controls(w);
                bar_percent(&controls).or_else(|| {
                    controls
                        .iter()
                        .filter(|c| !c.text.is_empty())
                        .find_map(|c| parse_progress_text(&c.text))
                })
            })
    }
}

/// `N%` in a window title, as shown by most repack extractors.
pub struct WindowTitle;

impl ProgressInspector for WindowTitle {
    fn name(&self) -> &'static str {
        "window_title"
    }

    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        ctx.windows.iter().find_map(|w| parse_percent(&w.title))
    }
}

/// Estimate from memory use of the process tree and fresh temp files.
pub struct ResourceGrowth {
    settings: MonitorSettings,
}

impl ResourceGrowth {
    pub const fn new(settings: MonitorSettings) -> Self {
        Self { settings }
    }

    #[allow(clippy::cast_precision_loss)]
    fn memory_estimate(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        let snapshot = ctx.process_table.snapshot();
        let mut pids = descendants_deepest_first(&snapshot, ctx.pid);
        pids.push(ctx.pid);
        let total: u64 = snapshot
            .iter()
            .filter(|p| pids.contains(&p.pid))
            .map(|p| p.memory_bytes)
            .sum();

        let mb = total / MIB;
        if mb < self.settings.memory_floor_mb || self.settings.memory_mb_per_percent == 0 {
            return None;
        }
        Some((mb - self.settings.memory_floor_mb) as f64 / self.settings.memory_mb_per_percent as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn temp_estimate(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        if self.settings.temp_mb_per_percent == 0 {
            return None;
        }
        let entries = std::fs::read_dir(&ctx.temp_dir).ok()?;
        let bytes: u64 = entries
            .flatten()
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .filter(|m| m.modified().is_ok_and(|t| t >= ctx.started_at))
            .map(|m| m.len())
            .filter(|len| *len >= self.settings.temp_file_min_mb * MIB)
            .sum();
        if bytes == 0 {
            return None;
        }
        Some((bytes / MIB) as f64 / self.settings.temp_mb_per_percent as f64)
    }
}

impl ProgressInspector for ResourceGrowth {
    fn name(&self) -> &'static str {
        "resource_growth"
    }

    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        if ctx.elapsed < self.settings.resource_elapsed_floor() {
            return None;
        }
        let estimate = match (self.memory_estimate(ctx), self.temp_estimate(ctx)) {
            (Some(a), Some(b)) => a.max(b),
            (a, b) => a.or(b)?,
        };
        Some(estimate.min(f64::from(self.settings.estimate_cap_percent)))
    }
}

/// Linear estimate from elapsed time against an expected duration.
pub struct ElapsedTime {
    expected: Duration,
    cap: u8,
    floor: u8,
}

impl ElapsedTime {
    pub const fn new(expected: Duration, cap: u8, floor: u8) -> Self {
        Self {
            expected,
            cap,
            floor,
        }
    }
}

impl ProgressInspector for ElapsedTime {
    fn name(&self) -> &'static str {
        "elapsed_time"
    }

    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64> {
        if self.expected.is_zero() {
            return None;
        }
        let percent = ctx.elapsed.as_secs_f64() / self.expected.as_secs_f64() * 100.0;
        if percent < f64::from(self.floor) {
            return None;
        }
        Some(percent.min(f64::from(self.cap)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::SystemTime;

    use unattend_core::{
        InstallError, NoopWindowInspector, ProcessInfo, ProcessTablePort, ProgressRange,
        WindowInspectorPort,
    };

    use super::*;

    struct Table(Vec<ProcessInfo>);

    impl ProcessTablePort for Table {
        fn snapshot(&self) -> Vec<ProcessInfo> {
            self.0.clone()
        }
        fn resident_memory(&self, pid: u32) -> Option<u64> {
            self.0.iter().find(|p| p.pid == pid).map(|p| p.memory_bytes)
        }
        fn request_close(&self, _pid: u32) -> Result<(), InstallError> {
            Ok(())
        }
        fn kill(&self, _pid: u32) -> Result<(), InstallError> {
            Ok(())
        }
        fn is_alive(&self, pid: u32) -> bool {
            self.0.iter().any(|p| p.pid == pid)
        }
    }

    struct Controls(Vec<ControlInfo>);

    impl WindowInspectorPort for Controls {
        fn windows_for_process(&self, _pid: u32) -> Vec<WindowInfo> {
            Vec::new()
        }
        fn child_controls(&self, _window: &WindowInfo) -> Vec<ControlInfo> {
            self.0.clone()
        }
    }

    fn window(class: &str, title: &str) -> WindowInfo {
        WindowInfo {
            handle: 1,
            title: title.to_string(),
            class_name: class.to_string(),
        }
    }

    fn ctx<'a>(
        windows: &'a [WindowInfo],
        inspector: &'a dyn WindowInspectorPort,
        table: &'a dyn ProcessTablePort,
        elapsed: Duration,
    ) -> ProgressContext<'a> {
        ProgressContext {
            pid: 10,
            elapsed,
            started_at: SystemTime::now(),
            windows,
            window_inspector: inspector,
            process_table: table,
            temp_dir: PathBuf::from("/definitely/not/here"),
        }
    }

    #[test]
    fn test_native_progress_bar() {
        let inspector = Controls(vec![ControlInfo {
            class_name: "msctls_progress32".to_string(),
            text: String::new(),
            progress: Some(ProgressRange {
                position: 30,
                min: 0,
                max: 60,
            }),
        }]);
        let windows = [window("Anything", "")];
        let table = Table(Vec::new());
        let c = ctx(&windows, &inspector, &table, Duration::ZERO);
        assert_eq!(NativeProgressBar.inspect(&c), Some(50.0));
    }

    #[test]
    fn test_framework_reads_status_text() {
        let inspector = Controls(vec![ControlInfo {
            class_name: "TNewStaticText".to_string(),
            text: "Extracting files... 3 of 12".to_string(),
            progress: None,
        }]);
        let table = Table(Vec::new());

        let inno = [window("TWizardForm", "Setup - Hades")];
        assert_eq!(
            FrameworkHeuristic.inspect(&ctx(&inno, &inspector, &table, Duration::ZERO)),
            Some(25.0)
        );

        let unknown = [window("Chrome_WidgetWin_1", "Browser")];
        assert_eq!(
            FrameworkHeuristic.inspect(&ctx(&unknown, &inspector, &table, Duration::ZERO)),
            None
        );
    }

    #[test]
    fn test_window_title() {
        let windows = [window("FreeArc", "Unpacking 67%")];
        let table = Table(Vec::new());
        let c = ctx(&windows, &NoopWindowInspector, &table, Duration::ZERO);
        assert_eq!(WindowTitle.inspect(&c), Some(67.0));
    }

    #[test]
    fn test_resource_growth_memory() {
        let settings = MonitorSettings::default();
        let table = Table(vec![
            ProcessInfo::new(10, Some(1), "setup.exe").with_memory(60 * MIB),
            ProcessInfo::new(11, Some(10), "unarc.exe").with_memory(80 * MIB),
            ProcessInfo::new(99, Some(1), "explorer.exe").with_memory(4000 * MIB),
        ]);
        let detector = ResourceGrowth::new(settings.clone());

        let early = ctx(&[], &NoopWindowInspector, &table, Duration::from_secs(1));
        assert_eq!(detector.inspect(&early), None);

        let later = ctx(&[], &NoopWindowInspector, &table, settings.resource_elapsed_floor());
        // (140 - 100) / 20
        assert_eq!(detector.inspect(&later), Some(2.0));
    }

    #[test]
    fn test_resource_growth_is_capped() {
        let settings = MonitorSettings::default();
        let table = Table(vec![
            ProcessInfo::new(10, Some(1), "setup.exe").with_memory(100_000 * MIB),
        ]);
        let c = ctx(&[], &NoopWindowInspector, &table, Duration::from_secs(60));
        assert_eq!(
            ResourceGrowth::new(settings.clone()).inspect(&c),
            Some(f64::from(settings.estimate_cap_percent))
        );
    }

    #[test]
    fn test_elapsed_time_floor_and_cap() {
        let detector = ElapsedTime::new(Duration::from_secs(100), 90, 5);
        let table = Table(Vec::new());
        let table: &dyn ProcessTablePort = &table;
        let at = move |secs| ctx(&[], &NoopWindowInspector, table, Duration::from_secs(secs));

        assert_eq!(detector.inspect(&at(2)), None);
        assert_eq!(detector.inspect(&at(50)), Some(50.0));
        assert_eq!(detector.inspect(&at(500)), Some(90.0));
    }
}
