use codonopt::config::{AppConfig, ConfigManager};
use codonopt::engines::generation::{
    ChannelProgressCallback, ConsoleProgressCallback, PopulationController, ProgressMessage, RunStatus,
};
use codonopt::sequence::CodonTable;
use std::io::Write;
use std::path::Path;

fn small_run(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.sequence.name = "met-lys".to_string();
    config.sequence.cds = vec!["AUGAAAUAA".to_string()];
    config.evolution.population = 4;
    config.evolution.survivors = 2;
    config.evolution.iterations = 1;
    config.evolution.initial_mutation_rate = 0.5;
    config.evolution.seed = 42;
    config.evolution.processes = 2;
    config.output.directory = dir.to_path_buf();
    config.validate().unwrap();
    config
}

fn data_rows(path: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).unwrap();
    text.lines().skip(1).map(str::to_string).collect()
}

#[test]
fn test_single_iteration_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_run(dir.path());

    let mut controller = PopulationController::from_config(&config).unwrap();
    let outcome = controller.run(&mut ConsoleProgressCallback).unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.population.len(), 2);

    let table = CodonTable::standard();
    for member in &outcome.population {
        assert_eq!(member.translate(&table), "MK*");
        assert_eq!(member.codon_count(), 3);
    }

    // Founder row plus the first iteration
    let rows = data_rows(&config.output.checkpoint_path());
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("0\t"));
    assert!(rows[1].starts_with("1\t"));
    assert!(rows[0].contains("AUGAAAUAA"));
}

#[test]
fn test_results_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_run(dir.path());

    let mut controller = PopulationController::from_config(&config).unwrap();
    controller.run(&mut ConsoleProgressCallback).unwrap();
    controller.save_results(&config.output, &config).unwrap();

    let fasta = std::fs::read_to_string(config.output.fasta_path()).unwrap();
    assert!(fasta.starts_with(">(best variant)_met-lys\n"));
    assert!(fasta.contains(">(mutant 1)_met-lys\n"));

    let parameters: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.output.parameters_path()).unwrap()).unwrap();
    assert_eq!(parameters["evolution"]["population"], 4);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.output.report_path()).unwrap()).unwrap();
    assert_eq!(report["initial"]["sequence"], "AUGAAAUAA");
    assert!(report["optimized"]["metrics"]["mfe"].is_number());
    assert!(report["optimized"]["local"]["unpaired"].is_array());
}

#[test]
fn test_zero_iterations_logs_founder_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_run(dir.path());
    config.evolution.iterations = 0;

    let (sender, receiver) = std::sync::mpsc::channel();
    let mut controller = PopulationController::from_config(&config).unwrap();
    let outcome = controller.run(&mut ChannelProgressCallback::new(sender)).unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.population.len(), 1);
    assert_eq!(data_rows(&config.output.checkpoint_path()).len(), 1);

    let messages: Vec<ProgressMessage> = receiver.try_iter().collect();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        ProgressMessage::Progress(snapshot) => {
            assert!(snapshot.is_final());
            assert!(!snapshot.error);
        }
        other => panic!("unexpected message {:?}", other),
    }
}

#[test]
fn test_run_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[sequence]
protein = "MKW"

[evolution]
iterations = 2
population = 6
survivors = 2
initial_mutation_rate = 0.4
processes = 1

[scoring.ucount]
off = true

[output]
directory = "{}"
"#,
        dir.path().display().to_string().replace('\\', "/")
    )
    .unwrap();

    let manager = ConfigManager::new();
    manager.load_from_file(file.path()).unwrap();
    let config = manager.get();

    let mut controller = PopulationController::from_config(&config).unwrap();
    let outcome = controller.run(&mut ConsoleProgressCallback).unwrap();

    assert_ne!(outcome.status, RunStatus::Failed);
    let table = CodonTable::standard();
    assert!(outcome.population.iter().all(|m| m.translate(&table) == "MKW*"));

    let header = std::fs::read_to_string(config.output.checkpoint_path()).unwrap();
    let header = header.lines().next().unwrap().to_string();
    assert!(header.contains("metric:aup"));
    assert!(!header.contains("score:ucount"));
}
