/// Progress bar over the source files handled by one command, labeled with what is being done
/// to them.
#[macro_export]
macro_rules! init_progress {
    ($files:expr, $verb:expr) => {{
        let pb = indicatif::ProgressBar::new($files.len() as u64);
        let template = format!(
            "{{spinner:.green}} {} [{{bar:30.cyan/blue}}] {{pos}}/{{len}} files {{wide_msg:.dim}}",
            $verb
        );
        pb.set_style(
            indicatif::ProgressStyle::with_template(&template)
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb
    }};
}

/// Mark the file at `$index` done, showing its path.
#[macro_export]
macro_rules! update_progress {
    ($pb:ident, $index:expr, $file:expr) => {
        $pb.set_message($file.display().to_string());
        $pb.set_position(($index + 1) as u64);
    };
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    #[test]
    fn test_progress_over_files() {
        let files = vec![PathBuf::from("a.js"), PathBuf::from("b.js")];
        let pb = init_progress!(files, "instrumenting");
        for (index, file) in files.iter().enumerate() {
            update_progress!(pb, index, file);
        }
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.message(), "b.js");
    }
}
