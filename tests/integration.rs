use std::{fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[population]\n"
        + "n_agents = 120\n"
        + "grid_size = 40.0\n"
        + "n_seed_infected = 2\n"
        + "\n"
        + "[disease]\n"
        + "beta = 1.5\n"
        + "interaction_radius = 2.0\n"
        + "incubation_mean = 4.0\n"
        + "incubation_std = 1.0\n"
        + "infectious_mean = 6.0\n"
        + "infectious_std = 2.0\n"
        + "case_fatality_rate = 0.05\n"
        + "\n"
        + "[mobility]\n"
        + "home_attraction = 0.05\n"
        + "random_force = 1.0\n"
        + "damping = 0.05\n"
        + "\n"
        + "[interventions]\n"
        + "vaccination_rate = 0.002\n"
        + "detection_prob = 0.3\n"
        + "isolation_compliance = 0.8\n"
        + "\n"
        + "[run]\n"
        + "dt = 0.5\n"
        + "seed = 7\n"
        + "\n"
        + "[output]\n"
        + "steps_per_run = 64\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagio"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    assert!(test_dir.join("run-0000/trajectory-0002.msgpack").is_file());
    assert!(test_dir.join("run-0000/results.json").is_file());
    assert!(test_dir.join("run-0001/results.json").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}
