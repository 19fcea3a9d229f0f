// SPDX-License-Identifier: MIT
//
// mimpirun-equivalent launcher: forks `world_size` copies of a program,
// wires a full mesh of anonymous pipes between them, and renumbers every
// inherited descriptor into the [20, 1023) band before exec so the child's
// own stdio and any descriptors it opens later can't collide with the mesh.
//
// Usage:
//   launcher <world_size> <program> [args...]

use std::env;
use std::os::unix::io::RawFd;
use std::process::ExitCode;

const FD_BAND_START: RawFd = 20;
const FD_BAND_END: RawFd = 1023;

fn setenv_int(name: &str, val: RawFd) {
    env::set_var(name, val.to_string());
}

fn make_pipe() -> [RawFd; 2] {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        panic!("pipe() failed: {}", std::io::Error::last_os_error());
    }
    fds
}

fn close_fd(fd: RawFd) {
    if unsafe { libc::close(fd) } != 0 {
        panic!("close({fd}) failed: {}", std::io::Error::last_os_error());
    }
}

/// Move `fd` to `target` via `dup2` and close the original, unless it's
/// already sitting at `target`. Returns the descriptor now holding the end.
fn renumber(fd: RawFd, target: RawFd) -> RawFd {
    if fd == target {
        return fd;
    }
    if unsafe { libc::dup2(fd, target) } < 0 {
        panic!("dup2({fd}, {target}) failed: {}", std::io::Error::last_os_error());
    }
    close_fd(fd);
    target
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: launcher <world_size> <program> [args...]");
        return ExitCode::FAILURE;
    }

    let world_size: usize = match args[1].parse() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("invalid world_size {:?}: {e}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    if world_size < 2 {
        eprintln!("world_size must be at least 2, got {world_size}");
        return ExitCode::FAILURE;
    }

    let prog_name = args[2].clone();
    let prog_args = &args[2..];

    // Close everything a caller's shell might have left open in the band
    // we're about to claim, so renumbering below can't collide.
    for fd in FD_BAND_START..=FD_BAND_END {
        unsafe {
            libc::close(fd);
        }
    }

    // channels[i][j] = [read_end, write_end] of the pipe carrying bytes
    // from j (writer) to i (reader).
    let mut channels = vec![vec![[-1 as RawFd, -1 as RawFd]; world_size]; world_size];
    let mut next_free = FD_BAND_START;

    for i in 0..world_size {
        for j in 0..world_size {
            if i == j {
                continue;
            }
            let pipe_fds = make_pipe();
            let mut ends = [pipe_fds[0], pipe_fds[1]];
            for end in ends.iter_mut() {
                *end = renumber(*end, next_free);
                next_free += 1;
            }
            channels[i][j] = ends;
        }
    }

    log::info!("launching {world_size} ranks of {prog_name:?}");

    let mut children = Vec::with_capacity(world_size);
    for rank in 0..world_size {
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            panic!("fork() failed: {}", std::io::Error::last_os_error());
        }
        if pid == 0 {
            run_child(world_size, rank, &channels, &prog_name, prog_args);
            unreachable!("run_child always execs or exits the process");
        }
        children.push(pid);
    }

    for i in 0..world_size {
        for j in 0..world_size {
            if i == j {
                continue;
            }
            close_fd(channels[i][j][0]);
            close_fd(channels[i][j][1]);
        }
    }

    let mut exit_code = 0;
    for pid in children {
        let mut status: libc::c_int = 0;
        if unsafe { libc::waitpid(pid, &mut status, 0) } < 0 {
            panic!("waitpid({pid}) failed: {}", std::io::Error::last_os_error());
        }
        let rank_status = unsafe { libc::WEXITSTATUS(status) };
        if unsafe { libc::WIFEXITED(status) } && rank_status != 0 {
            log::warn!("rank for pid {pid} exited with status {rank_status}");
            exit_code = exit_code.max(rank_status);
        } else if unsafe { libc::WIFSIGNALED(status) } {
            let sig = unsafe { libc::WTERMSIG(status) };
            log::warn!("rank for pid {pid} killed by signal {sig}");
            exit_code = exit_code.max(128 + sig);
        }
    }

    if exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(exit_code as u8)
    }
}

/// Child-side setup: close every fd not belonging to this rank, export the
/// `MIMPI_*` environment contract, and exec into the target program. Never
/// returns.
fn run_child(
    world_size: usize,
    rank: usize,
    channels: &[Vec<[RawFd; 2]>],
    prog_name: &str,
    prog_args: &[String],
) -> ! {
    for i in 0..world_size {
        for j in 0..world_size {
            if i == j || i == rank || j == rank {
                continue;
            }
            close_fd(channels[i][j][0]);
            close_fd(channels[i][j][1]);
        }
    }

    setenv_int("MIMPI_WORLD_SIZE", world_size as RawFd);
    setenv_int("MIMPI_RANK", rank as RawFd);

    for i in 0..world_size {
        if i == rank {
            continue;
        }
        // channels[rank][i][0]: our read end of what i writes to us.
        // channels[i][rank][1]: our write end of what i reads from us.
        close_fd(channels[i][rank][0]);
        close_fd(channels[rank][i][1]);

        setenv_int(&format!("MIMPI_READ_DSC_{i}"), channels[rank][i][0]);
        setenv_int(&format!("MIMPI_WRITE_DSC_{i}"), channels[i][rank][1]);
    }

    let c_prog = std::ffi::CString::new(prog_name).expect("program name contains NUL");
    let c_args: Vec<std::ffi::CString> = prog_args
        .iter()
        .map(|a| std::ffi::CString::new(a.as_str()).expect("argument contains NUL"))
        .collect();
    let mut argv: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
    argv.push(std::ptr::null());

    unsafe {
        libc::execvp(c_prog.as_ptr(), argv.as_ptr());
    }
    let err = std::io::Error::last_os_error();
    eprintln!("execvp({prog_name:?}) failed: {err}");
    std::process::exit(127);
}
