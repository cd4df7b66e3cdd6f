use crate::domain::models::PlannerPolicy;
use crate::infrastructure::config::{ensure_default_configs, load_policy, read_user_id};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::plan_repository::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
    pub user_id: String,
    pub policy: PlannerPolicy,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, PlannerError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("planner.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let policy = load_policy(&config_dir)?;
    let user_id = read_user_id(&config_dir)?;
    initialize_database(&database_path)?;

    info!(
        workspace_root = %workspace_root.display(),
        user_id = %user_id,
        "bootstrapped planner workspace"
    );
    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
        user_id,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "timeline-planner-bootstrap-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn bootstrap_creates_layout_and_database() {
        let workspace = TempWorkspace::new();
        let result = bootstrap_workspace(&workspace.path).expect("bootstrap");

        assert!(result.config_dir.join("app.json").exists());
        assert!(result.logs_dir.is_dir());
        assert!(result.database_path.exists());
        assert_eq!(result.user_id, "default");
        assert_eq!(result.policy, PlannerPolicy::default());

        bootstrap_workspace(&workspace.path).expect("bootstrap is repeatable");
    }

    #[test]
    fn bootstrap_surfaces_invalid_app_config() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path.join("config");
        fs::create_dir_all(&config_dir).expect("config dir");
        fs::write(config_dir.join("app.json"), r#"{"schema":3}"#).expect("seed app.json");
        assert!(matches!(
            bootstrap_workspace(&workspace.path),
            Err(PlannerError::InvalidConfig(_))
        ));
    }
}
