use std::path::PathBuf;

const PROMPT_FILES: &[&str] = &[
    "create-pipeline.md",
    "security-audit.md",
    "k8s-deploy.md",
    "dora-report.md",
];

fn main() {
    // Prompt bodies are embedded with include_dir!, which does not track changes on stable
    println!("cargo:rerun-if-changed=prompts/");

    let prompts_path = PathBuf::from("prompts");
    for file in PROMPT_FILES {
        let path = prompts_path.join(file);
        if !path.exists() {
            panic!("missing prompt body: {}", path.display());
        }
    }
}
