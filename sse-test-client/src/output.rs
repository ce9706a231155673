use crate::scenarios::TestResult;
use colored::*;

pub fn print_test_result(result: &TestResult) {
    if result.passed {
        println!(
            "{} {} ({} ms)",
            "✓".green(),
            result.scenario_name.bold(),
            result.duration.as_millis()
        );
    } else {
        println!(
            "{} {} ({} ms)",
            "✗".red(),
            result.scenario_name.bold(),
            result.duration.as_millis()
        );
        if let Some(message) = &result.message {
            println!("    {}", message.red());
        }
    }
}

pub fn print_test_summary(results: &[TestResult]) {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    println!("\n{}", "=== Summary ===".bold());
    println!("Total:  {}", results.len());
    println!("Passed: {}", passed.to_string().green());
    if failed > 0 {
        println!("Failed: {}", failed.to_string().red());
    } else {
        println!("Failed: {}", failed);
    }
}
