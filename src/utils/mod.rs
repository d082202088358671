/// Make a video identifier safe to use as a file stem
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// Shorten text for console previews, appending an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// External tools the audio step needs that are not on PATH
pub async fn check_dependencies(ffmpeg: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{} - required for --tts audio encoding", ffmpeg));
    }

    missing
}

async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
