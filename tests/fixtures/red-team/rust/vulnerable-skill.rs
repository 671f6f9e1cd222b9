// Red-team sample for Rust sources.

use std::fs::File;
use std::process::Command;

fn execute_command(user_input: &str) {
    Command::new("sh")
        .arg("-c")
        .arg(format!("ls -la {}", user_input))
        .spawn()
        .expect("failed to execute");
}

fn risky_operation() {
    unsafe {
        let ptr: *const i32 = std::ptr::null();
        println!("{:?}", *ptr);
    }
}

fn read_user_file(filename: &str) {
    let path = format!("/data/{}", filename);
    File::open(path).unwrap();
}

const API_KEY: &str = "sk-prod-abcdefghijklmnop123456789";

fn divide(a: i32, b: i32) -> i32 {
    let result = a.checked_div(b).unwrap();
    result
}
