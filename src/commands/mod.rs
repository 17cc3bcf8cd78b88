pub mod shell;
pub mod sync;

use crate::core::TreeEntry;

/// 把一行浏览条目格式化为终端输出
pub fn format_entry(entry: &TreeEntry) -> String {
    match entry {
        TreeEntry::ParentLink { location } => format!("  ..  (当前位置: {})", location),
        TreeEntry::Folder { name } => format!("  [目录] {}", name),
        TreeEntry::File {
            name,
            last_modified,
            size,
        } => {
            let modified = last_modified
                .map(|t| {
                    t.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_else(|| "-".to_string());
            format!("  {:<40} {:>19} {:>10}", name, modified, size)
        }
        TreeEntry::Notice { message } => format!("  ! {}", message),
    }
}

pub fn print_entries(title: &str, entries: &[TreeEntry]) {
    println!("{}", title);
    if entries.is_empty() {
        println!("  (空)");
    }
    for entry in entries {
        println!("{}", format_entry(entry));
    }
}
