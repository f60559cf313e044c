mod session;
mod wake;
mod watch;
